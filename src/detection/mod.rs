//! Disease detection
//!
//! Upload handling, simulated analysis, treatment advice and the
//! per-user detection history.

pub mod analyzer;
pub mod recommendations;
pub mod report;

use chrono::DateTime;
use chrono_tz::Tz;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::db::queries;
use crate::models::detection::{DetectionWithUser, NewDetection};
use crate::models::user::User;
use crate::models::UnknownVariant;
use crate::settings;
use crate::{AppError, SharedState};

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Which models to run on an upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    YellowLeaf,
    FruitRot,
    #[default]
    Both,
}

impl DetectionType {
    pub fn includes_leaf(&self) -> bool {
        matches!(self, DetectionType::YellowLeaf | DetectionType::Both)
    }

    pub fn includes_fruit(&self) -> bool {
        matches!(self, DetectionType::FruitRot | DetectionType::Both)
    }
}

impl std::str::FromStr for DetectionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "yellow_leaf" => Ok(DetectionType::YellowLeaf),
            "fruit_rot" => Ok(DetectionType::FruitRot),
            "both" | "" => Ok(DetectionType::Both),
            other => Err(UnknownVariant::new("detection type", other)),
        }
    }
}

/// True when the file name carries an accepted image extension
pub fn allowed_file(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client file name to a safe ASCII name
pub fn sanitize_filename(file_name: &str) -> String {
    let flattened: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// `<user_id>_<YYYYmmdd_HHMMSS>_<name>`
pub fn stored_file_name(user_id: i64, now: &DateTime<Tz>, original: &str) -> String {
    let mut name = sanitize_filename(original);
    if !allowed_file(&name) {
        let ext = original
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string());
        name = format!("image.{}", ext);
    }
    format!("{}_{}_{}", user_id, now.format("%Y%m%d_%H%M%S"), name)
}

/// Contents of the upload form
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// `None` when the form had no `image` field
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
    pub detection_type: Option<String>,
    pub location: Option<String>,
}

/// Check the upload form before anything touches the disk
pub fn validate_upload(upload: &Upload) -> Result<(&str, DetectionType), AppError> {
    let file_name = upload
        .file_name
        .as_deref()
        .ok_or_else(|| AppError::Upload("No image uploaded.".into()))?;
    if file_name.trim().is_empty() {
        return Err(AppError::Upload("No image selected.".into()));
    }
    if !allowed_file(file_name) {
        return Err(AppError::Upload(
            "Invalid file type. Please upload an image (PNG, JPG, JPEG, GIF).".into(),
        ));
    }

    let detection_type = upload
        .detection_type
        .as_deref()
        .unwrap_or_default()
        .parse::<DetectionType>()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    Ok((file_name, detection_type))
}

async fn remove_image(image_path: &str) {
    if image_path.is_empty() {
        return;
    }
    match tokio::fs::remove_file(image_path).await {
        Ok(()) => tracing::debug!("Removed image {}", image_path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Error deleting image file {}: {}", image_path, e),
    }
}

/// Largest accepted image in MB: the `max_upload_size` setting, capped by
/// the server's body limit
pub fn upload_limit_mb(conn: &Connection, server_max_mb: u64) -> Result<f64, AppError> {
    let configured = settings::number(conn, settings::MAX_UPLOAD_SIZE)?;
    Ok(configured.min(server_max_mb as f64))
}

/// Store an upload, analyze it and record the detection.
///
/// `rain_chance` (0..=100) picks the spraying warning. Returns the new id.
pub async fn submit(
    state: &SharedState,
    user: &User,
    upload: Upload,
    rain_chance: u32,
) -> Result<i64, AppError> {
    let (file_name, detection_type) = validate_upload(&upload)?;

    let limit_mb = state
        .db
        .with_connection(|conn| Ok(upload_limit_mb(conn, state.config.max_upload_mb)))??;
    if upload.bytes.len() as f64 > limit_mb * 1024.0 * 1024.0 {
        return Err(AppError::PayloadTooLarge(format!(
            "Image is larger than {} MB.",
            limit_mb
        )));
    }

    let stored_name = stored_file_name(user.id, &clock::now_ist(), file_name);
    let path = state.config.upload_dir.join(&stored_name);
    let image_path = path.to_string_lossy().replace('\\', "/");

    tokio::fs::write(&path, &upload.bytes).await?;
    tracing::info!("Saved upload {} for user {}", image_path, user.id);

    let bytes = upload.bytes;
    let analysis = tokio::task::spawn_blocking(move || analyzer::analyze(&bytes, detection_type))
        .await
        .map_err(|e| AppError::Internal(format!("Analysis task failed: {}", e)))?;

    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!("Could not decode {}: {}", image_path, e);
            remove_image(&image_path).await;
            return Err(AppError::Image(
                "Please upload a clear image of an arecanut leaf or fruit.".into(),
            ));
        }
    };

    let (disease_name, confidence) = analysis.primary();
    let advice = recommendations::for_disease(&disease_name, confidence);

    let detection = NewDetection {
        user_id: user.id,
        image_path,
        disease_name,
        severity: advice.severity.to_string(),
        confidence,
        location: upload.location.unwrap_or_default(),
        recommendation: advice.treatment.to_string(),
        weather_warning: recommendations::weather_warning(rain_chance).to_string(),
    };

    let id = state
        .db
        .with_connection(|conn| queries::insert_detection(conn, &detection))?;
    tracing::info!(
        "Detection {} for user {}: {} ({:.2}%)",
        id,
        user.id,
        detection.disease_name,
        detection.confidence
    );
    Ok(id)
}

/// Fetch a detection the user may look at: their own, or any for admins
pub fn viewable(conn: &Connection, user: &User, detection_id: i64) -> Result<DetectionWithUser, AppError> {
    let entry = queries::get_detection(conn, detection_id)?
        .ok_or_else(|| AppError::NotFound(format!("Detection {} not found", detection_id)))?;

    if entry.detection.user_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("Access denied.".into()));
    }
    Ok(entry)
}

/// Detection history, newest first. Admins see everyone's.
pub fn history(conn: &Connection, user: &User) -> Result<Vec<DetectionWithUser>, AppError> {
    if user.is_admin() {
        return Ok(queries::list_all_detections(conn, None)?);
    }

    let own = queries::list_detections_for_user(conn, user.id, None)?
        .into_iter()
        .map(|detection| DetectionWithUser {
            detection,
            user_name: user.name.clone(),
        })
        .collect();
    Ok(own)
}

/// Delete one of the user's own detections and its image
pub async fn delete(state: &SharedState, user: &User, detection_id: i64) -> Result<(), AppError> {
    let image_path = state.db.with_connection(|conn| {
        let entry = queries::get_detection(conn, detection_id)?;
        Ok(entry.map(|e| (e.detection.user_id, e.detection.image_path)))
    })?;

    let (owner, image_path) =
        image_path.ok_or_else(|| AppError::NotFound(format!("Detection {} not found", detection_id)))?;
    if owner != user.id {
        return Err(AppError::Forbidden("Access denied.".into()));
    }

    remove_image(&image_path).await;
    state
        .db
        .with_connection(|conn| queries::delete_detection(conn, detection_id))?;
    tracing::info!("User {} deleted detection {}", user.id, detection_id);
    Ok(())
}

/// Delete all of the user's detections and their images
pub async fn clear_all(state: &SharedState, user: &User) -> Result<usize, AppError> {
    let images: Vec<String> = state.db.with_connection(|conn| {
        Ok(queries::list_detections_for_user(conn, user.id, None)?
            .into_iter()
            .map(|d| d.image_path)
            .collect())
    })?;

    for image_path in &images {
        remove_image(image_path).await;
    }

    let removed = state
        .db
        .with_connection(|conn| queries::delete_detections_for_user(conn, user.id))?;
    tracing::info!("User {} cleared {} detections", user.id, removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config};
    use crate::db::Database;
    use crate::models::user::{NewUser, UserType};
    use crate::AppState;
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;
    use std::path::Path;
    use std::sync::Arc;

    fn png_bytes(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(40, 40, image::Rgb([r, g, b]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn setup(dir: &Path) -> (SharedState, User, User) {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let mut config = Config::from_cli(Cli::default()).unwrap();
        config.upload_dir = dir.to_path_buf();

        let make = |phone: &str, user_type| {
            db.with_connection(|conn| {
                let id = queries::insert_user(
                    conn,
                    &NewUser {
                        phone: phone.to_string(),
                        email: None,
                        name: format!("User {}", phone),
                        location: None,
                        farm_size: None,
                        user_type,
                        password_hash: "x".to_string(),
                    },
                )?;
                Ok(queries::get_user(conn, id)?.unwrap())
            })
            .unwrap()
        };
        let farmer = make("1111111111", UserType::Farmer);
        let admin = make("2222222222", UserType::Developer);

        (Arc::new(AppState::new(db, config)), farmer, admin)
    }

    fn upload(name: &str, bytes: Vec<u8>) -> Upload {
        Upload {
            file_name: Some(name.to_string()),
            bytes,
            detection_type: Some("both".to_string()),
            location: Some("Puttur".to_string()),
        }
    }

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("leaf.JPG"));
        assert!(allowed_file("a.b.png"));
        assert!(!allowed_file("leaf"));
        assert!(!allowed_file("leaf.bmp"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my leaf.jpg"), "my_leaf.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd.png"), "etc_passwd.png");
        assert_eq!(sanitize_filename("ಎಲೆ.png"), "png");
    }

    #[test]
    fn test_stored_file_name() {
        let now = Kolkata.with_ymd_and_hms(2025, 6, 1, 8, 5, 9).unwrap();
        assert_eq!(stored_file_name(7, &now, "my leaf.jpg"), "7_20250601_080509_my_leaf.jpg");
        assert_eq!(stored_file_name(7, &now, "ಎಲೆ.PNG"), "7_20250601_080509_image.png");
    }

    #[test]
    fn test_validate_upload_messages() {
        let missing = Upload::default();
        assert_eq!(validate_upload(&missing).unwrap_err().to_string(), "Upload error: No image uploaded.");

        let empty = upload("", vec![]);
        assert_eq!(validate_upload(&empty).unwrap_err().to_string(), "Upload error: No image selected.");

        let wrong = upload("notes.txt", vec![]);
        assert!(matches!(validate_upload(&wrong), Err(AppError::Upload(_))));

        let mut bad_type = upload("leaf.png", vec![]);
        bad_type.detection_type = Some("stem".to_string());
        assert!(matches!(validate_upload(&bad_type), Err(AppError::Validation(_))));

        let mut defaulted = upload("leaf.png", vec![]);
        defaulted.detection_type = None;
        assert_eq!(validate_upload(&defaulted).unwrap().1, DetectionType::Both);
    }

    #[tokio::test]
    async fn test_submit_view_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (state, farmer, admin) = setup(dir.path());

        let id = submit(&state, &farmer, upload("leaf.png", png_bytes(40, 140, 40)), 70)
            .await
            .unwrap();

        let entry = state
            .db
            .with_connection(|conn| Ok(viewable(conn, &farmer, id)))
            .unwrap()
            .unwrap();
        assert_eq!(entry.detection.disease_name.as_deref(), Some("Healthy"));
        assert_eq!(entry.detection.severity.as_deref(), Some("None"));
        assert_eq!(entry.detection.weather_warning.as_deref(), Some(recommendations::RAIN_WARNING));
        assert!(Path::new(&entry.detection.image_path).starts_with(dir.path()));
        assert!(Path::new(&entry.detection.image_path).exists());

        // Admin may view but not delete
        let as_admin = state.db.with_connection(|conn| Ok(viewable(conn, &admin, id))).unwrap();
        assert!(as_admin.is_ok());
        assert!(matches!(delete(&state, &admin, id).await, Err(AppError::Forbidden(_))));

        delete(&state, &farmer, id).await.unwrap();
        assert!(!Path::new(&entry.detection.image_path).exists());
        let gone = state.db.with_connection(|conn| Ok(viewable(conn, &farmer, id))).unwrap();
        assert!(matches!(gone, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upload_size_setting_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let (state, farmer, _) = setup(dir.path());

        let limit = state
            .db
            .with_connection(|conn| Ok(upload_limit_mb(conn, state.config.max_upload_mb)))
            .unwrap()
            .unwrap();
        assert_eq!(limit, 16.0);

        state
            .db
            .with_connection(|conn| {
                queries::set_setting_value(conn, settings::MAX_UPLOAD_SIZE, "0.00001", None)?;
                Ok(())
            })
            .unwrap();

        let result = submit(&state, &farmer, upload("leaf.png", png_bytes(40, 140, 40)), 10).await;
        assert!(matches!(result, Err(AppError::PayloadTooLarge(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_other_farmer_cannot_view() {
        let dir = tempfile::tempdir().unwrap();
        let (state, farmer, _) = setup(dir.path());
        let id = submit(&state, &farmer, upload("leaf.png", png_bytes(200, 190, 40)), 10)
            .await
            .unwrap();

        let mut stranger = farmer.clone();
        stranger.id = farmer.id + 100;
        let result = state.db.with_connection(|conn| Ok(viewable(conn, &stranger, id))).unwrap();
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (state, farmer, _) = setup(dir.path());

        let result = submit(&state, &farmer, upload("leaf.png", b"garbage".to_vec()), 10).await;
        assert!(matches!(result, Err(AppError::Image(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_history_and_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let (state, farmer, admin) = setup(dir.path());

        submit(&state, &farmer, upload("a.png", png_bytes(40, 140, 40)), 10).await.unwrap();
        submit(&state, &admin, upload("b.png", png_bytes(90, 50, 20)), 10).await.unwrap();

        let own = state.db.with_connection(|conn| Ok(history(conn, &farmer))).unwrap().unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].user_name, farmer.name);

        let all = state.db.with_connection(|conn| Ok(history(conn, &admin))).unwrap().unwrap();
        assert_eq!(all.len(), 2);

        assert_eq!(clear_all(&state, &farmer).await.unwrap(), 1);
        let own = state.db.with_connection(|conn| Ok(history(conn, &farmer))).unwrap().unwrap();
        assert!(own.is_empty());
    }
}
