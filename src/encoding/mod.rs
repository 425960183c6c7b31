//! Text encodings the store uses for attributes that travel as headers:
//! grantee lists for ACL grants and the query-string tag set.

pub mod grants;
pub mod tagging;
