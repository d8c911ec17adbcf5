//! Market-data boundary
//!
//! The screener reads symbols and price series through a reader acquired
//! from a [`MarketDataConnector`]. The reader is an explicitly owned handle:
//! whoever holds it must release it with [`MarketDataReader::close`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{PricePoint, SymbolDescriptor};

/// Failures of the market-data collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("market data source unreachable: {0}")]
    Unreachable(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("reader already closed")]
    Closed,
}

/// Acquires readers; called lazily, at most once per screener
pub trait MarketDataConnector {
    type Reader: MarketDataReader;

    fn connect(&self) -> Result<Self::Reader, SourceError>;
}

/// Open handle to the market data
pub trait MarketDataReader {
    /// Symbols whose market/scale category is in `markets`; all symbols when empty
    fn list_symbols(&self, markets: &[String]) -> Result<Vec<SymbolDescriptor>, SourceError>;

    /// Daily series of one symbol, ascending by date; may be empty
    fn series(&self, code: &str) -> Result<Vec<PricePoint>, SourceError>;

    /// Release the underlying connection
    fn close(self) -> Result<(), SourceError>
    where
        Self: Sized;
}

// ============================================================
// IN-MEMORY MARKET
// ============================================================

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    closes: AtomicUsize,
}

/// In-process universe, for callers that already hold their data
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarket {
    symbols: Arc<BTreeMap<String, (SymbolDescriptor, Vec<PricePoint>)>>,
    counters: Arc<Counters>,
}

impl InMemoryMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, descriptor: SymbolDescriptor, series: Vec<PricePoint>) -> Self {
        Arc::make_mut(&mut self.symbols).insert(descriptor.code.clone(), (descriptor, series));
        self
    }

    /// Readers handed out so far
    pub fn connections_opened(&self) -> usize {
        self.counters.connects.load(Ordering::Relaxed)
    }

    /// Readers closed so far
    pub fn connections_closed(&self) -> usize {
        self.counters.closes.load(Ordering::Relaxed)
    }
}

impl MarketDataConnector for InMemoryMarket {
    type Reader = InMemoryReader;

    fn connect(&self) -> Result<InMemoryReader, SourceError> {
        self.counters.connects.fetch_add(1, Ordering::Relaxed);
        Ok(InMemoryReader {
            symbols: Arc::clone(&self.symbols),
            counters: Arc::clone(&self.counters),
        })
    }
}

/// Reader over an [`InMemoryMarket`]
#[derive(Debug)]
pub struct InMemoryReader {
    symbols: Arc<BTreeMap<String, (SymbolDescriptor, Vec<PricePoint>)>>,
    counters: Arc<Counters>,
}

impl MarketDataReader for InMemoryReader {
    fn list_symbols(&self, markets: &[String]) -> Result<Vec<SymbolDescriptor>, SourceError> {
        Ok(self
            .symbols
            .values()
            .map(|(descriptor, _)| descriptor)
            .filter(|d| {
                markets.is_empty()
                    || d.scale_category
                        .as_ref()
                        .is_some_and(|category| markets.contains(category))
            })
            .cloned()
            .collect())
    }

    fn series(&self, code: &str) -> Result<Vec<PricePoint>, SourceError> {
        self.symbols
            .get(code)
            .map(|(_, series)| series.clone())
            .ok_or_else(|| SourceError::UnknownSymbol(code.to_string()))
    }

    fn close(self) -> Result<(), SourceError> {
        self.counters.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
