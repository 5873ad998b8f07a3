mod common;
mod notify;
mod pipeline;
mod portal;
mod sqlite;
