use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use image::DynamicImage;

/// Page-segmentation modes tried for restricted-region OCR, in fixed
/// preference order. The first configuration producing non-empty text
/// wins; the full search is only paid when the default pass fails.
const PSM_PREFERENCE: [u32; 4] = [6, 7, 11, 3];

pub struct OcrEngine {
    lang: String,
}

impl OcrEngine {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
        }
    }

    /// Single-pass OCR under the engine's default configuration. Used
    /// for unrestricted whole-page text acquisition.
    pub fn recognize(&self, image: &DynamicImage) -> Result<String> {
        self.run_tesseract(image, None)
    }

    /// Multi-configuration OCR for restricted regions: retries under
    /// each page-segmentation mode in preference order and returns the
    /// first non-empty result.
    pub fn recognize_region(&self, image: &DynamicImage) -> Result<String> {
        for psm in PSM_PREFERENCE {
            let text = self.run_tesseract(image, Some(psm))?;
            if !text.trim().is_empty() {
                return Ok(text);
            }
        }

        Ok(String::new())
    }

    fn run_tesseract(&self, image: &DynamicImage, psm: Option<u32>) -> Result<String> {
        let png_path = scratch_png_path();
        image
            .save(&png_path)
            .with_context(|| format!("failed to write OCR scratch image: {}", png_path.display()))?;

        let mut command = Command::new("tesseract");
        command
            .arg(&png_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang);
        if let Some(psm) = psm {
            command.arg("--psm").arg(psm.to_string());
        }

        let output = command
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", png_path.display()));

        let _ = fs::remove_file(&png_path);
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                png_path.display(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .replace('\u{0000}', "")
            .trim()
            .to_string())
    }
}

fn scratch_png_path() -> PathBuf {
    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!(
        "docksort_ocr_{}_{}.png",
        std::process::id(),
        stamp
    ))
}

pub fn tesseract_version() -> Option<String> {
    let output = Command::new("tesseract").arg("--version").output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

pub fn tesseract_available() -> bool {
    Command::new("tesseract").arg("--version").output().is_ok()
}
