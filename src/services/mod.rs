//! Service layer for the sync application.
//!
//! This module contains the network-facing collaborators:
//! - Feed fetching (`FeedFetcher`)
//! - Job-board API calls (`JobBoardClient`)

mod feed;
mod job_board;

pub use feed::{FeedFetcher, FeedSource};
pub use job_board::{JobBoard, JobBoardClient};
