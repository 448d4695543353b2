pub mod sapmsg;

/// RSUB-SAP (dispatch <-> radio submission channel).
pub mod rsub;

/// TN-SMS-SAP (applications/consent surface <-> dispatch).
pub mod tnsms;
