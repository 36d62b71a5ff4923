// src/video_source.rs

use crate::error::{Result, VelocimetryError};
use crate::types::VideoConfig;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst},
};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

pub struct VideoProcessor {
    config: VideoConfig,
}

impl VideoProcessor {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let mut videos = Vec::new();

        let video_extensions = vec!["mp4", "avi", "mov", "mkv", "MP4", "AVI", "MOV", "MKV"];

        for entry in WalkDir::new(&self.config.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if video_extensions.contains(&ext.to_str().unwrap_or("")) {
                    videos.push(path.to_path_buf());
                }
            }
        }

        videos.sort();
        info!("Found {} video files", videos.len());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| VelocimetryError::VideoSource(format!("non-utf8 path: {:?}", path)))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            return Err(VelocimetryError::VideoSource(format!(
                "failed to open {}",
                path.display()
            )));
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i32;

        info!(
            "Video properties: {:.1} FPS, {} frames, processing at {}x{}",
            fps, total_frames, self.config.process_width, self.config.process_height
        );

        Ok(VideoReader {
            cap,
            fps,
            total_frames,
            current_frame: 0,
            process_size: Size::new(self.config.process_width, self.config.process_height),
        })
    }
}

pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i32,
    pub current_frame: i32,
    process_size: Size,
}

impl VideoReader {
    /// Next frame, resized to the processing resolution and converted to
    /// grayscale. None at end of stream.
    pub fn read_gray_frame(&mut self) -> Result<Option<Mat>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();
        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }
        self.current_frame += 1;

        let mut resized = Mat::default();
        imgproc::resize(
            &mat,
            &mut resized,
            self.process_size,
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut gray = Mat::default();
        imgproc::cvt_color(&resized, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        Ok(Some(gray))
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames <= 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}
