mod catalog;
mod concurrency;
mod dispatcher;
mod emulator;
mod resp;
mod test_utils;
