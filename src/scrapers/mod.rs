//! News source scrapers.
//!
//! Each scraper follows the same two-phase pattern:
//!
//! 1. **Indexing**: list the articles linked from the source's homepage
//! 2. **Extraction**: pull the readable text out of one article page
//!
//! Only [RBC](https://www.rbc.ru/) is supported. Parsing is split from
//! retrieval so the markup handling can be exercised without a network.

pub mod rbc;
