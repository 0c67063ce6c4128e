//! Classify inbound requests by the headers the queue service attaches.
//!
//! A request is from the queue when it carries a task name and a queue name
//! other than the cron sentinel; it is from the cron trigger when the queue
//! name is the sentinel. The two never hold at once.

use std::collections::{BTreeMap, HashMap};

pub const QUEUE_NAME_HEADER: &str = "x-appengine-queuename";
pub const TASK_NAME_HEADER: &str = "x-appengine-taskname";
pub const CRON_QUEUE_NAME: &str = "__cron";

/// Case-insensitive header access.
pub trait HeaderLookup {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str).or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }
}

impl HeaderLookup for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str).or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }
}

impl HeaderLookup for http::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl<B> HeaderLookup for http::Request<B> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers().header(name)
    }
}

fn non_empty<'a, H: HeaderLookup + ?Sized>(headers: &'a H, name: &str) -> Option<&'a str> {
    headers
        .header(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Triggered by the queue service for a regular task.
pub fn is_from_queue<H: HeaderLookup + ?Sized>(headers: &H) -> bool {
    non_empty(headers, TASK_NAME_HEADER).is_some()
        && non_empty(headers, QUEUE_NAME_HEADER).is_some_and(|queue| queue != CRON_QUEUE_NAME)
}

/// Triggered by the cron scheduler.
pub fn is_from_cron<H: HeaderLookup + ?Sized>(headers: &H) -> bool {
    non_empty(headers, TASK_NAME_HEADER).is_some()
        && non_empty(headers, QUEUE_NAME_HEADER) == Some(CRON_QUEUE_NAME)
}
