mod tests_cancellation;
mod tests_error_recovery;
mod tests_incremental;
