pub mod helpers;
mod merge;
