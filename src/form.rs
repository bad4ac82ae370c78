// Registration form state: identity fields, photos, terms gate and submission checks.

use crate::camera::{CaptureTarget, CapturedImage};
use crate::surface::SignatureImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentType {
    #[default]
    CitizenId,
    ForeignerId,
    Passport,
    IdentityCard,
}

impl DocumentType {
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::CitizenId => "CITIZEN ID",
            DocumentType::ForeignerId => "FOREIGNER ID",
            DocumentType::Passport => "PASSPORT",
            DocumentType::IdentityCard => "IDENTITY CARD",
        }
    }

    /// Next option in the selector, wrapping around.
    pub fn next(self) -> Self {
        match self {
            DocumentType::CitizenId => DocumentType::ForeignerId,
            DocumentType::ForeignerId => DocumentType::Passport,
            DocumentType::Passport => DocumentType::IdentityCard,
            DocumentType::IdentityCard => DocumentType::CitizenId,
        }
    }
}

/// Text fields the user types into, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    FullName,
    ArtisticName,
    DocumentNumber,
}

impl Field {
    pub fn next(self) -> Self {
        match self {
            Field::FullName => Field::ArtisticName,
            Field::ArtisticName => Field::DocumentNumber,
            Field::DocumentNumber => Field::FullName,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::FullName => "FULL NAME",
            Field::ArtisticName => "ARTISTIC NAME",
            Field::DocumentNumber => "ID NUMBER",
        }
    }
}

/// Why a submission was refused. Shown to the user; nothing is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("full name is required")]
    MissingFullName,
    #[error("document number is required")]
    MissingDocumentNumber,
    #[error("a selfie is required")]
    MissingSelfie,
    #[error("no signature provided")]
    MissingSignature,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registration {
    pub full_name: String,
    pub artistic_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub selfie: Option<CapturedImage>,
    pub document_front: Option<CapturedImage>,
    pub document_back: Option<CapturedImage>,
}

impl Registration {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::FullName => &self.full_name,
            Field::ArtisticName => &self.artistic_name,
            Field::DocumentNumber => &self.document_number,
        }
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::FullName => &mut self.full_name,
            Field::ArtisticName => &mut self.artistic_name,
            Field::DocumentNumber => &mut self.document_number,
        }
    }

    /// Typed characters are stored upper-cased.
    pub fn type_char(&mut self, field: Field, ch: char) {
        if ch.is_control() {
            return;
        }
        self.field_mut(field).extend(ch.to_uppercase());
    }

    pub fn backspace(&mut self, field: Field) {
        self.field_mut(field).pop();
    }

    pub fn set_field(&mut self, field: Field, value: &str) {
        *self.field_mut(field) = value.to_uppercase();
    }

    pub fn photo(&self, target: CaptureTarget) -> Option<&CapturedImage> {
        match target {
            CaptureTarget::Selfie => self.selfie.as_ref(),
            CaptureTarget::DocumentFront => self.document_front.as_ref(),
            CaptureTarget::DocumentBack => self.document_back.as_ref(),
        }
    }

    pub fn set_photo(&mut self, target: CaptureTarget, image: CapturedImage) {
        let slot = match target {
            CaptureTarget::Selfie => &mut self.selfie,
            CaptureTarget::DocumentFront => &mut self.document_front,
            CaptureTarget::DocumentBack => &mut self.document_back,
        };
        *slot = Some(image);
    }

    /// Alias as printed on documents.
    pub fn artistic_name_or(&self, fallback: &str) -> String {
        if self.artistic_name.trim().is_empty() {
            fallback.to_string()
        } else {
            self.artistic_name.clone()
        }
    }

    /// Everything required before a contract may be generated.
    pub fn validate(&self, signature: Option<&SignatureImage>, is_signed: bool) -> Result<(), ValidationError> {
        if self.full_name.trim().is_empty() {
            return Err(ValidationError::MissingFullName);
        }
        if self.document_number.trim().is_empty() {
            return Err(ValidationError::MissingDocumentNumber);
        }
        if self.selfie.is_none() {
            return Err(ValidationError::MissingSelfie);
        }
        if signature.is_none() || !is_signed {
            return Err(ValidationError::MissingSignature);
        }
        Ok(())
    }
}

/// Terms may only be accepted once the text has been scrolled to its end.
#[derive(Debug, Clone)]
pub struct TermsGate {
    offset: f32,
    content_height: f32,
    viewport_height: f32,
    reached_end: bool,
    accepted: bool,
}

impl TermsGate {
    /// Slack allowed when deciding "scrolled to the end".
    pub const END_SLACK: f32 = 20.0;

    pub fn new(content_height: f32, viewport_height: f32) -> Self {
        let mut gate = Self { offset: 0.0, content_height, viewport_height, reached_end: false, accepted: false };
        gate.check_end();
        gate
    }

    pub fn scroll_by(&mut self, delta: f32) {
        let max = (self.content_height - self.viewport_height).max(0.0);
        self.offset = (self.offset + delta).clamp(0.0, max);
        self.check_end();
    }

    /// The visible area changed size. Reaching the end is never undone.
    pub fn resize_viewport(&mut self, viewport_height: f32) {
        self.viewport_height = viewport_height;
        self.scroll_by(0.0);
    }

    fn check_end(&mut self) {
        if self.offset + self.viewport_height >= self.content_height - Self::END_SLACK {
            self.reached_end = true;
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn can_accept(&self) -> bool {
        self.reached_end
    }

    /// Returns whether the terms are now accepted.
    pub fn accept(&mut self) -> bool {
        if self.reached_end {
            self.accepted = true;
        }
        self.accepted
    }

    /// Skip the gate (resumed sessions already accepted once).
    pub fn force_accept(&mut self) {
        self.reached_end = true;
        self.accepted = true;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn reset(&mut self) {
        self.offset = 0.0;
        self.reached_end = false;
        self.accepted = false;
        self.check_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> CapturedImage {
        CapturedImage { file_name: "selfie.png".into(), png: vec![1], width: 1, height: 1 }
    }

    fn signature() -> SignatureImage {
        SignatureImage { png: vec![1], width: 1, height: 1 }
    }

    fn complete() -> Registration {
        let mut r = Registration::default();
        r.set_field(Field::FullName, "ana maria");
        r.set_field(Field::DocumentNumber, "1020");
        r.set_photo(CaptureTarget::Selfie, photo());
        r
    }

    #[test]
    fn typing_is_upper_cased() {
        let mut r = Registration::default();
        for ch in "dj ñu".chars() {
            r.type_char(Field::ArtisticName, ch);
        }
        r.type_char(Field::ArtisticName, '\n');
        assert_eq!(r.artistic_name, "DJ ÑU");
        r.backspace(Field::ArtisticName);
        assert_eq!(r.field(Field::ArtisticName), "DJ Ñ");
    }

    #[test]
    fn validation_order() {
        let sig = signature();
        assert_eq!(Registration::default().validate(Some(&sig), true), Err(ValidationError::MissingFullName));

        let mut r = complete();
        r.document_number.clear();
        assert_eq!(r.validate(Some(&sig), true), Err(ValidationError::MissingDocumentNumber));

        let mut r = complete();
        r.selfie = None;
        assert_eq!(r.validate(Some(&sig), true), Err(ValidationError::MissingSelfie));

        let r = complete();
        assert_eq!(r.validate(None, true), Err(ValidationError::MissingSignature));
        assert_eq!(r.validate(Some(&sig), false), Err(ValidationError::MissingSignature));
        assert_eq!(r.validate(Some(&sig), true), Ok(()));
    }

    #[test]
    fn document_types_cycle() {
        let mut t = DocumentType::default();
        for _ in 0..4 {
            t = t.next();
        }
        assert_eq!(t, DocumentType::CitizenId);
    }

    #[test]
    fn terms_need_scrolling_to_the_end() {
        let mut gate = TermsGate::new(500.0, 200.0);
        assert!(!gate.accept());
        gate.scroll_by(250.0);
        assert!(!gate.can_accept());
        gate.scroll_by(35.0);
        assert!(gate.can_accept(), "within slack of the end");
        assert!(gate.accept());
        gate.reset();
        assert!(!gate.is_accepted());
        assert_eq!(gate.offset(), 0.0);
    }

    #[test]
    fn growing_viewport_reaches_the_end() {
        let mut gate = TermsGate::new(500.0, 200.0);
        gate.scroll_by(100.0);
        gate.resize_viewport(300.0);
        assert!(!gate.can_accept());
        gate.resize_viewport(480.0);
        assert!(gate.can_accept());
        assert_eq!(gate.offset(), 20.0);
        gate.resize_viewport(100.0);
        assert!(gate.can_accept());
        assert!(gate.accept());
    }

    #[test]
    fn short_terms_are_accepted_immediately() {
        let mut gate = TermsGate::new(100.0, 200.0);
        assert!(gate.accept());
    }
}
