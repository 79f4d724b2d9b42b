//! Document rendering contract and the built-in single-page PDF layout.

use super::domain::{InvoiceFields, InvoiceType, RenderedDocument};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invoice layout failed: {0}")]
    Layout(String),
    #[error("rendering backend unavailable: {0}")]
    Backend(String),
}

/// Produces a printable document from structured invoice fields.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError>;

    /// Pure in-process layout with no I/O. Such renderers are called on the caller's thread
    /// instead of behind the collaborator deadline.
    fn in_process(&self) -> bool {
        false
    }
}

const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN: u32 = 56;
const LINE_HEIGHT: u32 = 18;
const MAX_LINES: usize = (PAGE_HEIGHT as usize - 2 * MARGIN as usize) / LINE_HEIGHT as usize;

/// Minimal A4 PDF with the standard Helvetica font.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfInvoiceRenderer;

impl DocumentRenderer for PdfInvoiceRenderer {
    fn render(&self, fields: &InvoiceFields) -> Result<RenderedDocument, RenderError> {
        let lines = invoice_lines(fields);
        if lines.len() > MAX_LINES {
            return Err(RenderError::Layout(format!(
                "{} lines do not fit on one page",
                lines.len()
            )));
        }

        Ok(RenderedDocument {
            bytes: write_pdf(&lines),
            filename: format!("invoice-{}.pdf", fields.number),
            content_type: mime::APPLICATION_PDF.to_string(),
        })
    }

    fn in_process(&self) -> bool {
        true
    }
}

fn invoice_lines(fields: &InvoiceFields) -> Vec<String> {
    let mut lines = vec![
        fields.organization.clone(),
        format!("Invoice {}", fields.number),
        format!("Issued on {}", fields.issued_on),
        String::new(),
        format!("Billed to: {}", fields.member_name),
        format!("E-mail: {}", fields.member_email),
        format!("Member id: {}", fields.member_id),
        format!("Grade: {}", fields.belt_grade.label()),
        String::new(),
    ];

    let item = match fields.invoice_type {
        InvoiceType::Membership => {
            format!("Annual membership ({})", fields.membership_type.label())
        }
        InvoiceType::Shop => "Shop purchase".to_string(),
        InvoiceType::Other => "Miscellaneous".to_string(),
    };
    lines.push(format!("Item: {item}"));
    if let Some(coverage) = fields.coverage {
        lines.push(format!(
            "Coverage: {} to {}",
            coverage.starts_on, coverage.ends_on
        ));
    }
    lines.push(format!("Subscription status: {}", fields.subscription_status));
    lines.push(String::new());
    lines.push(format!("Total: {:.2}", fields.amount));
    lines
}

fn write_pdf(lines: &[String]) -> Vec<u8> {
    let mut content = format!(
        "BT\n/F1 12 Tf\n{LINE_HEIGHT} TL\n{MARGIN} {} Td\n",
        PAGE_HEIGHT - MARGIN
    )
    .into_bytes();
    for line in lines {
        content.push(b'(');
        content.extend(escape_text(line));
        content.extend_from_slice(b") Tj T*\n");
    }
    content.extend_from_slice(b"ET");

    let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
    stream.extend_from_slice(&content);
    stream.extend_from_slice(b"\nendstream");

    let objects: [Vec<u8>; 5] = [
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        stream,
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = pdf.len();
    let size = objects.len() + 1;
    pdf.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n")
            .as_bytes(),
    );
    pdf
}

/// WinAnsi bytes for a PDF literal string.
fn escape_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                bytes.push(b'\\');
                bytes.push(ch as u8);
            }
            '€' => bytes.push(0x80),
            c if c.is_control() => bytes.push(b' '),
            c if u32::from(c) < 0x80 || (0xA0..=0xFF).contains(&u32::from(c)) => {
                bytes.push(u32::from(c) as u8)
            }
            _ => bytes.push(b'?'),
        }
    }
    bytes
}
