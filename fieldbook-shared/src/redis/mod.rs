/// Redis client for the revocable-token store

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
