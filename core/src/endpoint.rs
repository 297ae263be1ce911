//! The closed set of TicketBaiWS operations.
//!
//! Each variant maps to exactly one service name and HTTP method. The URL of
//! an endpoint is always `<base_url><service_name>/`.

use crate::http::HttpMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Service health, certificate and license state.
    Status,
    /// Send a new invoice, or correct one with `zuzendu`.
    SubmitInvoice,
    /// Turn one or more simplified invoices into a full invoice.
    CompleteInvoice,
    /// Cancel a submitted invoice. Its number cannot be reused.
    CancelInvoice,
    /// Fetch the huella, QR and validation URL of a submitted invoice.
    LookupInvoice,
    /// Download the XML exchanged with the tax authority, base64-encoded.
    FetchInvoiceXml,
    ListLicenses,
    CreateLicense,
    ListCompanies,
    CreateCompany,
    /// IAE epígrafes used when registering self-employed accounts.
    ListTaxCategories,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Status,
        Endpoint::SubmitInvoice,
        Endpoint::CompleteInvoice,
        Endpoint::CancelInvoice,
        Endpoint::LookupInvoice,
        Endpoint::FetchInvoiceXml,
        Endpoint::ListLicenses,
        Endpoint::CreateLicense,
        Endpoint::ListCompanies,
        Endpoint::CreateCompany,
        Endpoint::ListTaxCategories,
    ];

    pub fn service_name(&self) -> &'static str {
        match self {
            Endpoint::Status => "status",
            Endpoint::SubmitInvoice | Endpoint::CancelInvoice | Endpoint::LookupInvoice => "tbai",
            Endpoint::CompleteInvoice => "tbai-completar",
            Endpoint::FetchInvoiceXml => "tbai-xml",
            Endpoint::ListLicenses | Endpoint::CreateLicense => "licencias",
            Endpoint::ListCompanies | Endpoint::CreateCompany => "empresas",
            Endpoint::ListTaxCategories => "epigrafes",
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Endpoint::SubmitInvoice
            | Endpoint::CompleteInvoice
            | Endpoint::CreateLicense
            | Endpoint::CreateCompany => HttpMethod::Post,
            Endpoint::CancelInvoice => HttpMethod::Delete,
            Endpoint::Status
            | Endpoint::LookupInvoice
            | Endpoint::FetchInvoiceXml
            | Endpoint::ListLicenses
            | Endpoint::ListCompanies
            | Endpoint::ListTaxCategories => HttpMethod::Get,
        }
    }
}
