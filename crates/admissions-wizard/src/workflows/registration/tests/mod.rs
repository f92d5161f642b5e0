mod common;
mod guardian_sync;
