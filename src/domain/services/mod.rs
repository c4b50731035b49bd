pub mod filter_rewriter;

pub use filter_rewriter::rewrite_filter;
