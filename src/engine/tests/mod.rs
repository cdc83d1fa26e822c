use super::*;
use crate::engine::test_helpers::*;
use tokio_util::sync::CancellationToken;

mod refresh;
mod verify;
