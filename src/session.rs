//! Registration flow: terms, form, active session, exit.
//!
//! Side effects (documents on disk, upload, notification, persisted session) happen in
//! `submit` and `finish`. Network and document failures never block the phase change; they are
//! logged and surface as a degraded link.

use crate::document::{self, DocumentGenerator, Stamp};
use crate::form::{Registration, TermsGate, ValidationError};
use crate::fx::Rng32;
use crate::notify::{Notification, Notifier};
use crate::store::{ActiveSession, SessionStore};
use crate::surface::SignatureSurface;
use crate::upload::{UploadLink, Uploader};
use chrono::Local;
use log::{error, info, warn};
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Terms,
    Form,
    Active,
    Finished,
}

/// Static settings of one kiosk.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub club_name: String,
    pub recipient_email: String,
    pub output_dir: PathBuf,
    pub folio_seed: u32,
}

/// Result of generating, saving and publishing one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub saved_to: Option<PathBuf>,
    pub link: UploadLink,
}

pub struct Kiosk<U: Uploader, N: Notifier> {
    phase: Phase,
    registration: Registration,
    terms: TermsGate,
    signed: Rc<Cell<bool>>,
    store: SessionStore,
    generator: DocumentGenerator,
    uploader: U,
    notifier: N,
    settings: SessionSettings,
    rng: Rng32,
}

fn timestamp() -> String {
    Local::now().format("%d/%m/%Y, %H:%M:%S").to_string()
}

impl<U: Uploader, N: Notifier> Kiosk<U, N> {
    /// A kiosk at the terms screen, or straight in `Active` when the store holds an open session.
    pub fn new(settings: SessionSettings, store: SessionStore, terms: TermsGate, uploader: U, notifier: N) -> Self {
        let mut kiosk = Self {
            phase: Phase::Terms,
            registration: Registration::default(),
            terms,
            signed: Rc::new(Cell::new(false)),
            generator: DocumentGenerator::new(&settings.club_name),
            rng: Rng32::from_seed(settings.folio_seed),
            store,
            uploader,
            notifier,
            settings,
        };
        kiosk.resume();
        kiosk
    }

    fn resume(&mut self) {
        if let Some(session) = self.store.load() {
            info!("resuming session of {} ({})", session.full_name, session.document_number);
            self.registration = session.to_registration();
            self.terms.force_accept();
            self.phase = Phase::Active;
        }
    }

    /// Shared flag set by the signature surface's draw-start callback.
    pub fn signed_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.signed)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn registration_mut(&mut self) -> &mut Registration {
        &mut self.registration
    }

    pub fn terms(&self) -> &TermsGate {
        &self.terms
    }

    pub fn terms_mut(&mut self) -> &mut TermsGate {
        &mut self.terms
    }

    pub fn is_signed(&self) -> bool {
        self.signed.get()
    }

    /// Leave the terms screen once the gate allows it.
    pub fn accept_terms(&mut self) -> bool {
        if self.phase == Phase::Terms && self.terms.accept() {
            self.phase = Phase::Form;
            true
        } else {
            false
        }
    }

    fn stamp(&mut self) -> Stamp {
        Stamp { timestamp: timestamp(), folio: self.rng.range_u32(1000, 9999) }
    }

    fn publish(&self, bytes: &[u8], file_name: &str, message: String) -> Published {
        let saved_to = match document::save_to_dir(&self.settings.output_dir, file_name, bytes) {
            Ok(path) => {
                info!("saved {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("could not save {file_name}: {e}");
                None
            }
        };
        let link = self.uploader.upload(bytes, file_name);
        let reg = &self.registration;
        self.notifier.notify(&Notification::new(
            &self.settings.recipient_email,
            &reg.full_name,
            &reg.document_number,
            &reg.artistic_name_or("N/A"),
            &link.to_string(),
            message,
        ));
        Published { saved_to, link }
    }

    /// Validate and open the session. `Ok(None)` means the contract could not be generated;
    /// the session is active regardless.
    pub fn submit(&mut self, surface: &SignatureSurface) -> Result<Option<Published>, ValidationError> {
        let signature = surface.export();
        self.registration.validate(signature.as_ref(), self.signed.get())?;
        let Some(signature) = signature else {
            return Err(ValidationError::MissingSignature);
        };

        info!("formalising contract for {}", self.registration.document_number);
        let stamp = self.stamp();
        let published = match self.generator.entry_contract(&self.registration, &signature, &stamp) {
            Ok(pdf) => {
                let name = document::contract_file_name(&self.registration.document_number);
                let message = format!("New entry registered: {}", self.registration.full_name);
                Some(self.publish(&pdf, &name, message))
            }
            Err(e) => {
                error!("contract generation failed: {e}");
                None
            }
        };

        info!("syncing record");
        let session = ActiveSession::from_registration(&self.registration, Local::now().to_rfc3339());
        if let Err(e) = self.store.save(&session) {
            warn!("session not persisted: {e}");
        }
        self.phase = Phase::Active;
        Ok(published)
    }

    /// Close the active session with an exit report. The store is cleared whatever happens.
    pub fn finish(&mut self) -> Option<Published> {
        if self.phase != Phase::Active {
            return None;
        }
        info!("generating exit report for {}", self.registration.document_number);
        let stamp = self.stamp();
        let published = match self.generator.exit_report(&self.registration, &stamp) {
            Ok(pdf) => {
                let name = document::exit_file_name(&self.registration.document_number);
                let message = format!("Exit registered: {}", self.registration.full_name);
                Some(self.publish(&pdf, &name, message))
            }
            Err(e) => {
                error!("exit report generation failed: {e}");
                None
            }
        };
        self.store.clear();
        self.phase = Phase::Finished;
        published
    }

    /// Wipe the drawn signature; the guest has to sign again.
    pub fn clear_signature(&mut self, surface: &mut SignatureSurface) {
        surface.clear();
        self.signed.set(false);
    }

    /// Back to a blank terms screen.
    pub fn reset_all(&mut self, surface: &mut SignatureSurface) {
        self.store.clear();
        self.registration = Registration::default();
        self.terms.reset();
        self.signed.set(false);
        surface.clear();
        self.phase = Phase::Terms;
    }
}
