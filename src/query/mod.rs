pub mod executor;
pub mod filter;
pub mod filter_parser;
pub mod fuzzy;
pub mod highlighter;
pub mod parser;

pub use executor::{
    FacetHit, FacetSearchQuery, FacetSearchResult, FacetStats, MatchingStrategy, QueryExecutor, SearchCancellation,
    SearchQuery, SearchResult, SortEntry,
};
pub use filter::{Filter, FilterInput};
pub use parser::QueryParser;
