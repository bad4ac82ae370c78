// What you SEE:
// • Terms screen: scroll to the end (wheel / arrows), Enter accepts.
// • Form: type name and ID, Tab moves field, F2 document type, F5/F6/F7 open the camera.
// • Sign in the box with the left mouse button; Delete clears it. Enter submits.
// • Active session: F10 then Y reports the exit. Closing the window quits.

use clap::Parser;
use log::{info, warn};
use signing_kiosk::camera::{CameraCapture, CameraIndices, FrameSource};
use signing_kiosk::config::{self, Args};
use signing_kiosk::draw::Drawer;
use signing_kiosk::error::Error;
use signing_kiosk::notify::{EmailJsNotifier, NoNotify, Notification, Notifier};
use signing_kiosk::session::{Kiosk, SessionSettings};
use signing_kiosk::store::{KvStore, SessionStore};
use signing_kiosk::ui::{self, CameraOpener, KioskUi};
use signing_kiosk::upload::{NoUpload, TmpFilesUploader, UploadLink, Uploader};
use std::time::{SystemTime, UNIX_EPOCH};

/// Upload backend chosen at startup.
enum AnyUploader {
    Host(TmpFilesUploader),
    Off(NoUpload),
}

impl Uploader for AnyUploader {
    fn upload(&self, bytes: &[u8], file_name: &str) -> UploadLink {
        match self {
            AnyUploader::Host(u) => u.upload(bytes, file_name),
            AnyUploader::Off(u) => u.upload(bytes, file_name),
        }
    }
}

/// Notification backend chosen at startup.
enum AnyNotifier {
    EmailJs(EmailJsNotifier),
    Off(NoNotify),
}

impl Notifier for AnyNotifier {
    fn notify(&self, notification: &Notification) {
        match self {
            AnyNotifier::EmailJs(n) => n.notify(notification),
            AnyNotifier::Off(n) => n.notify(notification),
        }
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();
    let args = Args::parse();
    let cfg = config::load(&args.config);
    info!("kiosk for {} ({}x{} @{})", cfg.club_name, args.width, args.height, args.scale);

    /* --- Outbound services ---
       Offline kiosks keep documents on disk only. */
    let uploader = if args.offline {
        AnyUploader::Off(NoUpload)
    } else {
        AnyUploader::Host(TmpFilesUploader::new(&cfg.upload_endpoint, cfg.upload_timeout)?)
    };
    let notifier = match (&cfg.emailjs, args.offline) {
        (Some(emailjs), false) => AnyNotifier::EmailJs(EmailJsNotifier::new(emailjs.clone(), cfg.upload_timeout)?),
        (None, false) => {
            warn!("no [emailjs] section in config; staff will not be notified");
            AnyNotifier::Off(NoNotify)
        }
        (_, true) => AnyNotifier::Off(NoNotify),
    };

    /* --- Session state ---
       A session left open by a previous run is resumed straight into the active screen. */
    let folio_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(0x2545_F491);
    let settings = SessionSettings {
        club_name: cfg.club_name.clone(),
        recipient_email: cfg.recipient_email.clone(),
        output_dir: args.output_dir.clone(),
        folio_seed,
    };
    let store = SessionStore::new(KvStore::new(&args.store));
    let terms = ui::terms_gate_for(args.width, args.height);
    let kiosk = Kiosk::new(settings, store, terms, uploader, notifier);

    /* --- Camera on demand ---
       Opened when a capture screen starts, released when it closes. */
    let indices = CameraIndices { front: args.camera_index, rear: args.rear_camera };
    let opener: CameraOpener = Box::new(move |target| {
        let cam = CameraCapture::open_for(target, indices, 1280, 720)?;
        Ok(Box::new(cam) as Box<dyn FrameSource>)
    });

    /* --- Window + main loop --- */
    let mut drawer = Drawer::new(&format!("{} - Registration", cfg.club_name), args.width, args.height)?;
    let mut kiosk_ui = KioskUi::new(kiosk, cfg.stroke, args.scale, drawer.size(), opener);
    ui::run(&mut drawer, &mut kiosk_ui)?;

    info!("window closed");
    Ok(())
}
