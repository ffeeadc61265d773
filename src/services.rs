pub mod credentials;
pub mod dispatcher;
pub mod importer;
pub mod post_query;
