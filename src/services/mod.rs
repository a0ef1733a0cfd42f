pub mod helpers;
pub mod registration;
pub mod scrape_loop;
pub mod stats_mapper;
