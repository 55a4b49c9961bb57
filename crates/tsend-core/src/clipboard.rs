//! Clipboard payloads for pasting images and files into the composer.
//!
//! Payloads are built as owned byte buffers here; the platform backend only
//! copies a finished buffer into shared memory and hands it over.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::ImageFormat;

use crate::desktop::{ClipboardBackend, ClipboardFormat};
use crate::{CoreError, Result};

/// Length of the `BITMAPFILEHEADER` that precedes DIB data in a `.bmp` file.
pub const BITMAP_FILE_HEADER_LEN: usize = 14;

/// Size of the `DROPFILES` header (`pFiles`, `pt.x`, `pt.y`, `fNC`, `fWide`).
pub const DROPFILES_HEADER_LEN: usize = 20;

/// `DROPEFFECT_COPY`.
pub const DROPEFFECT_COPY: u32 = 1;

/// Registered format carrying the preferred drop effect.
pub const PREFERRED_DROP_EFFECT: ClipboardFormat = ClipboardFormat::Registered("Preferred DropEffect");

/// How often and how patiently to retry opening a locked clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total open attempts, at least one.
    pub attempts: u32,
    /// Wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(100),
        }
    }
}

struct OpenGuard<'a, C: ClipboardBackend + ?Sized>(&'a C);

impl<C: ClipboardBackend + ?Sized> Drop for OpenGuard<'_, C> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Run `action` with exclusive clipboard access.
///
/// Opening is retried per `policy`, waiting through `sleep` between tries.
/// Access is released on every exit path once acquired, including errors
/// and panics inside `action`, and `action` runs at most once.
///
/// # Errors
///
/// Returns [`CoreError::ClipboardUnavailable`] when every attempt fails,
/// otherwise whatever `action` returns.
pub fn with_clipboard<C, T, F>(
    clipboard: &C,
    policy: RetryPolicy,
    sleep: impl Fn(Duration),
    action: F,
) -> Result<T>
where
    C: ClipboardBackend + ?Sized,
    F: FnOnce(&C) -> Result<T>,
{
    let attempts = policy.attempts.max(1);
    let mut guard = None;
    for attempt in 1..=attempts {
        match clipboard.open() {
            Ok(()) => {
                guard = Some(OpenGuard(clipboard));
                break;
            }
            Err(err) => {
                log::warn!("clipboard open attempt {attempt}/{attempts} failed: {err}");
                if attempt < attempts {
                    sleep(policy.delay);
                }
            }
        }
    }
    let Some(_guard) = guard else {
        return Err(CoreError::ClipboardUnavailable { attempts });
    };
    action(clipboard)
}

/// Strip the file header from `.bmp` bytes, leaving `BITMAPINFOHEADER` and pixels.
///
/// # Errors
///
/// Returns [`CoreError::Image`] if the data is not a bitmap file.
pub fn bitmap_payload(bmp: &[u8]) -> Result<Vec<u8>> {
    if bmp.len() <= BITMAP_FILE_HEADER_LEN || !bmp.starts_with(b"BM") {
        return Err(CoreError::Image("not a BMP file".to_string()));
    }
    Ok(bmp[BITMAP_FILE_HEADER_LEN..].to_vec())
}

/// Decode any supported image, flatten it to 24-bit RGB and return it as a DIB.
///
/// # Errors
///
/// Returns [`CoreError::Image`] if the file cannot be decoded or encoded.
pub fn encode_image_dib(path: &Path) -> Result<Vec<u8>> {
    let img = image::open(path)?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut bmp = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut bmp), ImageFormat::Bmp)?;
    log::debug!(
        "encoded {} ({}x{}) as {} byte bitmap",
        path.display(),
        rgb.width(),
        rgb.height(),
        bmp.len()
    );
    bitmap_payload(&bmp)
}

/// UTF-16LE path list: each path followed by NUL, the list by one more NUL.
///
/// # Errors
///
/// Returns [`CoreError::InvalidPath`] for an empty list, a path that is not
/// valid Unicode, or a path containing NUL.
pub fn encode_file_list(paths: &[PathBuf]) -> Result<Vec<u8>> {
    if paths.is_empty() {
        return Err(CoreError::InvalidPath {
            path: PathBuf::new(),
            reason: "no file paths provided",
        });
    }
    let mut units: Vec<u16> = Vec::new();
    for path in paths {
        let text = path.to_str().ok_or_else(|| CoreError::InvalidPath {
            path: path.clone(),
            reason: "path is not valid Unicode",
        })?;
        if text.is_empty() || text.contains('\0') {
            return Err(CoreError::InvalidPath {
                path: path.clone(),
                reason: "path is empty or contains NUL",
            });
        }
        units.extend(text.encode_utf16());
        units.push(0);
    }
    units.push(0);
    Ok(units.iter().flat_map(|u| u.to_le_bytes()).collect())
}

/// Inverse of [`encode_file_list`]: split on NUL up to the terminator.
#[must_use]
pub fn decode_file_list(bytes: &[u8]) -> Vec<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    units
        .split(|u| *u == 0)
        .take_while(|segment| !segment.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Clipboard payloads for a file drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDropPayload {
    /// `DROPFILES` header followed by the wide path list, for `CF_HDROP`.
    pub drop_files: Vec<u8>,
    /// Little-endian `DROPEFFECT_COPY`, for `Preferred DropEffect`.
    pub drop_effect: Vec<u8>,
}

impl FileDropPayload {
    /// Build the payload for absolute `paths`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if the path list cannot be encoded.
    pub fn new(paths: &[PathBuf]) -> Result<Self> {
        let list = encode_file_list(paths)?;
        let mut drop_files = Vec::with_capacity(DROPFILES_HEADER_LEN + list.len());
        drop_files.extend((DROPFILES_HEADER_LEN as u32).to_le_bytes());
        drop_files.extend(0_i32.to_le_bytes());
        drop_files.extend(0_i32.to_le_bytes());
        drop_files.extend(0_i32.to_le_bytes());
        drop_files.extend(1_i32.to_le_bytes());
        drop_files.extend(list);
        Ok(Self {
            drop_files,
            drop_effect: DROPEFFECT_COPY.to_le_bytes().to_vec(),
        })
    }

    /// The path list part, without the `DROPFILES` header.
    #[must_use]
    pub fn file_list(&self) -> &[u8] {
        &self.drop_files[DROPFILES_HEADER_LEN..]
    }
}

/// Replace clipboard contents with a DIB. Call inside [`with_clipboard`].
///
/// # Errors
///
/// Returns an error if the clipboard rejects the data.
pub fn place_bitmap<C: ClipboardBackend + ?Sized>(clipboard: &C, dib: &[u8]) -> Result<()> {
    clipboard.empty()?;
    clipboard.set_data(ClipboardFormat::Dib, dib)
}

/// Replace clipboard contents with a file drop. Call inside [`with_clipboard`].
///
/// # Errors
///
/// Returns an error if the clipboard rejects either payload.
pub fn place_file_drop<C: ClipboardBackend + ?Sized>(
    clipboard: &C,
    payload: &FileDropPayload,
) -> Result<()> {
    clipboard.empty()?;
    clipboard.set_data(ClipboardFormat::HDrop, &payload.drop_files)?;
    clipboard.set_data(PREFERRED_DROP_EFFECT, &payload.drop_effect)
}
