/// Slug of the company key to schema mapping.
pub const SAP_COMPANY_DB: &str = "SAP_COMPANY_DB";
/// Slug of the Service Layer credentials (`{"Username", "Passwords"}`).
pub const SAP_CREDENTIAL: &str = "sap_credential";
