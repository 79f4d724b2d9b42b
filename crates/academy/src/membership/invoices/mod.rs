//! Invoice issuance and the rendered documents attached to each invoice.

pub mod domain;
pub mod engine;
pub mod renderer;
pub mod repository;

pub use domain::{
    CoveragePeriod, Invoice, InvoiceFields, InvoiceId, InvoiceSummary, InvoiceType,
    RenderedDocument,
};
pub use engine::InvoiceEngine;
pub use renderer::{DocumentRenderer, PdfInvoiceRenderer, RenderError};
pub use repository::InvoiceRepository;
