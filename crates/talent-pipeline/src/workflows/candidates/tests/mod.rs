mod common;
mod filter;
mod notes;
mod saved_filters;
