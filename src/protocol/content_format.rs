//! Registered content-format identifiers.

/// `text/plain; charset=utf-8`
pub const TEXT_PLAIN_UTF8: u16 = 0;
/// `application/link-format`
pub const APP_LINK_FORMAT: u16 = 40;
/// `application/xml`
pub const APP_XML: u16 = 41;
/// `application/octet-stream`
pub const APP_OCTET_STREAM: u16 = 42;
/// `application/exi`
pub const APP_EXI: u16 = 47;
/// `application/json`
pub const APP_JSON: u16 = 50;
/// `application/rdf+xml`
pub const APP_RDF_XML: u16 = 201;
/// `text/turtle`
pub const APP_TURTLE: u16 = 202;
/// `text/n3`
pub const APP_N3: u16 = 203;
/// `application/shdt`
pub const APP_SHDT: u16 = 205;
