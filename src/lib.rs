/// Portfolio CMS - content-management REST backend for a personal portfolio
///
/// Projects and blog posts carry many-to-many tags; projects, skills and
/// certificates accept file attachments stored on local disk or a remote
/// object store. The same router serves a long-running process or a
/// function host.

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod portfolio;
pub mod server;
pub mod serverless;
pub mod tags;
pub mod uploads;
