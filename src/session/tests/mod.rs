use super::test_helpers::*;
use super::*;
use crate::types::{StateFilter, TorrentSpec};

mod recovery;
mod snapshot;
