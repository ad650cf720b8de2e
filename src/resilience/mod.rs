//! 轮询模块：异步任务的固定间隔、有界状态轮询。
//!
//! # Polling
//!
//! Asynchronous vendors hand back a job handle; the adapter then checks a
//! status endpoint at a fixed interval until the job finishes, fails, or the
//! attempt budget runs out. Every adapter goes through [`poll_until`], so the
//! three outcomes mean the same thing everywhere:
//!
//! | Check result | Loop outcome |
//! |--------------|--------------|
//! | [`PollStatus::Pending`] | wait `interval`, try again |
//! | [`PollStatus::Done`] | `Ok(value)` |
//! | [`PollStatus::Failed`] | the vendor's error, unchanged |
//! | attempts exhausted | [`Error::Timeout`](crate::Error::Timeout) |
//!
//! Waiting goes through a [`Sleeper`], which is `tokio::time::sleep` in
//! production and a recording fake in tests. There is no retry of failed
//! status checks; one transport error ends the job.

pub mod poll;

pub use poll::{poll_until, PollPolicy, PollStatus, Sleeper, TokioSleeper};
