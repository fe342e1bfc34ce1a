mod common;
mod test_batch;
mod test_cli;
