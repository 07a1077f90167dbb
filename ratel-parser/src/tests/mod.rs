//! Unit tests for the Ratel parser

mod test_expressions;
mod test_preprocess;
mod test_source_reconstruction;
