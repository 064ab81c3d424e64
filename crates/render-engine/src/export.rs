//! Encoding and persistence of finished timelines.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use drillreel_common::config::{AppConfig, RenderDefaults};
use drillreel_common::error::{DrillreelError, DrillreelResult};
use drillreel_drill_model::job::normalize_output_filename;
use serde::Serialize;

use crate::compositor::encode_png;
use crate::sequence::Timeline;
use crate::storage::{CloudinaryStore, ObjectStore, ResourceKind};

/// Progress callback for encoding.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames encoded so far.
    pub frames_rendered: u64,

    /// Total frames to encode.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Encoding,
    Finalizing,
    Uploading,
    Complete,
    Failed,
}

impl ExportProgress {
    fn at_stage(stage: ExportStage, progress: f64, total_frames: u64) -> Self {
        Self {
            progress,
            frames_rendered: (progress * total_frames as f64).round() as u64,
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Encoder parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub fps: u32,
    pub preset: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub audio_sample_rate: u32,
}

impl From<&RenderDefaults> for EncodeSettings {
    fn from(defaults: &RenderDefaults) -> Self {
        Self {
            fps: defaults.fps.max(1),
            preset: defaults.preset.clone(),
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            audio_sample_rate: defaults.audio_sample_rate,
        }
    }
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self::from(&RenderDefaults::default())
    }
}

/// One clip as the encoder sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSegment {
    pub frame_path: PathBuf,
    pub duration_secs: f64,
    pub audio_path: Option<PathBuf>,
}

/// Everything needed to produce one output file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub segments: Vec<EncodeSegment>,
    pub width: u32,
    pub height: u32,
    pub output_path: PathBuf,
    pub settings: EncodeSettings,
}

impl EncodeRequest {
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration_secs).sum()
    }

    pub fn has_audio(&self) -> bool {
        self.segments.iter().any(|s| s.audio_path.is_some())
    }

    pub fn total_frames(&self) -> u64 {
        (self.total_duration() * self.settings.fps as f64).ceil() as u64
    }
}

/// Trait for encode backends.
pub trait EncodeBackend: Send + Sync {
    /// Encode the request into `request.output_path`.
    fn encode(
        &self,
        request: &EncodeRequest,
        progress: Option<&ProgressCallback>,
    ) -> DrillreelResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Encodes by driving the `ffmpeg` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl EncodeBackend for FfmpegBackend {
    fn encode(
        &self,
        request: &EncodeRequest,
        progress: Option<&ProgressCallback>,
    ) -> DrillreelResult<()> {
        let args = build_ffmpeg_args(request);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut cmd = Command::new("ffmpeg");
        cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| DrillreelError::encode(format!("Failed to start ffmpeg: {e}")))?;

        let total_frames = request.total_frames();
        let expected_duration_secs = request.total_duration();
        tracing::info!(
            pid = child.id(),
            segments = request.segments.len(),
            total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DrillreelError::encode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DrillreelError::encode("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut latest = ProgressState::default();
        loop {
            line.clear();
            let bytes = reader.read_line(&mut line).map_err(|e| {
                DrillreelError::encode(format!("Failed reading ffmpeg progress: {e}"))
            })?;
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key == "progress" {
                if let Some(cb) = progress {
                    cb(progress_report(
                        &latest,
                        total_frames,
                        expected_duration_secs,
                        start.elapsed().as_secs_f64(),
                    ));
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| DrillreelError::encode(format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(DrillreelError::encode(format!(
                "ffmpeg failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            output = %request.output_path.display(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Full ffmpeg argument list for a request.
///
/// Inputs are the looped frame of every segment, then (only when some
/// segment has audio) one audio input per segment, with synthesized silence
/// for the segments that have none.
pub fn build_ffmpeg_args(request: &EncodeRequest) -> Vec<String> {
    let fps = request.settings.fps.max(1);
    let mut args: Vec<String> = ["-y", "-hide_banner", "-nostats", "-progress", "pipe:1"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for segment in &request.segments {
        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-t".to_string(),
            format!("{:.3}", segment.duration_secs),
            "-i".to_string(),
            segment.frame_path.display().to_string(),
        ]);
    }

    let with_audio = request.has_audio();
    if with_audio {
        for segment in &request.segments {
            match &segment.audio_path {
                Some(path) => {
                    args.push("-i".to_string());
                    args.push(path.display().to_string());
                }
                None => args.extend([
                    "-f".to_string(),
                    "lavfi".to_string(),
                    "-t".to_string(),
                    format!("{:.3}", segment.duration_secs),
                    "-i".to_string(),
                    format!(
                        "anullsrc=channel_layout=stereo:sample_rate={}",
                        request.settings.audio_sample_rate
                    ),
                ]),
            }
        }
    }

    args.push("-filter_complex".to_string());
    args.push(build_filter_graph(request));
    args.push("-map".to_string());
    args.push("[vout]".to_string());
    if with_audio {
        args.push("-map".to_string());
        args.push("[aout]".to_string());
    }

    args.extend(codec_args(&request.settings, with_audio));
    args.push("-r".to_string());
    args.push(fps.to_string());
    args.push(request.output_path.display().to_string());
    args
}

fn build_filter_graph(request: &EncodeRequest) -> String {
    let count = request.segments.len();
    let with_audio = request.has_audio();
    let mut chains = Vec::with_capacity(count * 2 + 1);
    let mut concat_inputs = String::new();

    for (i, segment) in request.segments.iter().enumerate() {
        chains.push(format!(
            "[{i}:v]scale={w}:{h}:flags=lanczos,setsar=1,fps={fps},format=yuv420p,trim=duration={d:.3},setpts=PTS-STARTPTS[v{i}]",
            w = request.width,
            h = request.height,
            fps = request.settings.fps.max(1),
            d = segment.duration_secs,
        ));
        concat_inputs.push_str(&format!("[v{i}]"));

        if with_audio {
            chains.push(format!(
                "[{input}:a]aformat=sample_rates={sr}:channel_layouts=stereo,apad,atrim=duration={d:.3},asetpts=PTS-STARTPTS[a{i}]",
                input = count + i,
                sr = request.settings.audio_sample_rate,
                d = segment.duration_secs,
            ));
            concat_inputs.push_str(&format!("[a{i}]"));
        }
    }

    if with_audio {
        chains.push(format!("{concat_inputs}concat=n={count}:v=1:a=1[vout][aout]"));
    } else {
        chains.push(format!("{concat_inputs}concat=n={count}:v=1:a=0[vout]"));
    }
    chains.join(";")
}

fn codec_args(settings: &EncodeSettings, with_audio: bool) -> Vec<String> {
    let mut args = vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        format!("{}k", settings.video_bitrate_kbps.max(500)),
    ];
    if with_audio {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", settings.audio_bitrate_kbps.max(64)),
            "-ar".to_string(),
            settings.audio_sample_rate.to_string(),
        ]);
    }
    args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    args
}

/// Check whether a binary is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let frames_rendered = (progress * total_frames as f64).round() as u64;
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            ExportStage::Finalizing
        } else {
            ExportStage::Encoding
        },
    }
}

/// Where a finished video ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum Persisted {
    Remote(String),
    Local(PathBuf),
}

impl Persisted {
    /// URL or filesystem path, as reported to callers.
    pub fn locator(&self) -> String {
        match self {
            Persisted::Remote(url) => url.clone(),
            Persisted::Local(path) => path.display().to_string(),
        }
    }
}

struct RemoteTarget {
    store: Arc<dyn ObjectStore>,
    folder: String,
}

/// Encodes timelines and puts the result somewhere durable.
pub struct OutputSink {
    output_dir: PathBuf,
    settings: EncodeSettings,
    backend: Arc<dyn EncodeBackend>,
    remote: Option<RemoteTarget>,
}

impl OutputSink {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        settings: EncodeSettings,
        backend: Arc<dyn EncodeBackend>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings,
            backend,
            remote: None,
        }
    }

    /// Upload finished files to `store` under `folder` instead of keeping
    /// them locally.
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>, folder: impl Into<String>) -> Self {
        self.remote = Some(RemoteTarget {
            store,
            folder: folder.into(),
        });
        self
    }

    /// ffmpeg encoder, plus Cloudinary when credentials are configured.
    pub fn from_config(config: &AppConfig) -> DrillreelResult<Self> {
        let sink = Self::new(
            config.output_dir.clone(),
            EncodeSettings::from(&config.render),
            Arc::new(FfmpegBackend::new()),
        );
        match &config.storage {
            Some(storage) => {
                let store = CloudinaryStore::new(storage)?;
                Ok(sink.with_store(Arc::new(store), storage.folder.clone()))
            }
            None => Ok(sink),
        }
    }

    /// Encode `timeline` and persist it.
    ///
    /// The encoder writes to a staging file next to the final name, which is
    /// renamed into place only after a successful encode. On encode failure
    /// the frame images and the staging file are removed and any existing
    /// file at the final name is left untouched. On upload failure the local
    /// file is kept and its path travels with the error.
    pub async fn persist(
        &self,
        timeline: &Timeline,
        filename: &str,
        progress: Option<&ProgressCallback>,
    ) -> DrillreelResult<Persisted> {
        let filename = normalize_output_filename(filename)?;
        let Some((width, height)) = timeline.dimensions() else {
            return Err(DrillreelError::render_input("Timeline has no clips"));
        };

        if !self.backend.is_available() {
            return Err(DrillreelError::encode(format!(
                "Encoder '{}' is not available (expected ffmpeg in PATH)",
                self.backend.name()
            )));
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            DrillreelError::encode(format!(
                "Failed to create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;
        let output_path = self.output_dir.join(&filename);

        if let Some(cb) = progress {
            cb(ExportProgress::at_stage(ExportStage::Preparing, 0.0, 0));
        }

        let frames_dir = tempfile::Builder::new()
            .prefix("drillreel-frames-")
            .tempdir()
            .map_err(|e| DrillreelError::encode(format!("Failed to create frame directory: {e}")))?;

        let mut segments = Vec::with_capacity(timeline.len());
        for (index, clip) in timeline.clips().iter().enumerate() {
            let frame_path = frames_dir.path().join(format!("frame_{index:03}.png"));
            std::fs::write(&frame_path, encode_png(&clip.frame)?).map_err(|e| {
                DrillreelError::encode(format!(
                    "Failed to write frame {}: {e}",
                    frame_path.display()
                ))
            })?;
            segments.push(EncodeSegment {
                frame_path,
                duration_secs: clip.duration_secs,
                audio_path: clip.audio.as_ref().map(|a| a.path.clone()),
            });
        }

        // Removed on drop unless renamed into place.
        let mut staging = tempfile::Builder::new();
        staging.prefix(".drillreel-").suffix(".mp4");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staging.permissions(std::fs::Permissions::from_mode(0o644));
        }
        let staging = staging
            .tempfile_in(&self.output_dir)
            .map_err(|e| {
                DrillreelError::encode(format!(
                    "Failed to stage output in {}: {e}",
                    self.output_dir.display()
                ))
            })?
            .into_temp_path();

        let request = EncodeRequest {
            segments,
            width,
            height,
            output_path: staging.to_path_buf(),
            settings: self.settings.clone(),
        };

        tracing::info!(
            backend = self.backend.name(),
            mode = %timeline.mode(),
            output = %output_path.display(),
            staging = %staging.display(),
            clips = request.segments.len(),
            duration_secs = request.total_duration(),
            has_audio = request.has_audio(),
            "Encoding timeline"
        );

        if let Err(err) = self.backend.encode(&request, progress) {
            if let Some(cb) = progress {
                cb(ExportProgress::at_stage(ExportStage::Failed, 0.0, request.total_frames()));
            }
            return Err(err);
        }
        let written = std::fs::metadata(&staging).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(DrillreelError::encode(format!(
                "Encoder reported success but {} was not written",
                output_path.display()
            )));
        }
        staging.persist(&output_path).map_err(|e| {
            DrillreelError::encode(format!(
                "Failed to move encoded video to {}: {}",
                output_path.display(),
                e.error
            ))
        })?;
        drop(frames_dir);

        let persisted = match &self.remote {
            None => Persisted::Local(output_path),
            Some(remote) => {
                if let Some(cb) = progress {
                    cb(ExportProgress::at_stage(ExportStage::Uploading, 1.0, request.total_frames()));
                }
                let key = Path::new(&filename)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| filename.clone());

                let url = remote
                    .store
                    .upload(&output_path, &remote.folder, &key, ResourceKind::Video)
                    .await
                    .map_err(|e| {
                        tracing::error!(store = remote.store.name(), error = %e, path = %output_path.display(), "Upload failed, keeping local file");
                        DrillreelError::persistence(e.to_string(), &output_path)
                    })?;

                if let Err(err) = std::fs::remove_file(&output_path) {
                    tracing::warn!(path = %output_path.display(), error = %err, "Uploaded, but failed to remove local file");
                }
                Persisted::Remote(url)
            }
        };

        if let Some(cb) = progress {
            cb(ExportProgress::at_stage(ExportStage::Complete, 1.0, request.total_frames()));
        }
        tracing::info!(locator = %persisted.locator(), "Video persisted");
        Ok(persisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(audio: &[bool]) -> EncodeRequest {
        EncodeRequest {
            segments: audio
                .iter()
                .enumerate()
                .map(|(i, has)| EncodeSegment {
                    frame_path: PathBuf::from(format!("/tmp/f/frame_{i:03}.png")),
                    duration_secs: 4.0 + i as f64,
                    audio_path: has.then(|| PathBuf::from(format!("/tmp/a/audio_{i}.mp3"))),
                })
                .collect(),
            width: 1280,
            height: 720,
            output_path: PathBuf::from("/tmp/out/demo.mp4"),
            settings: EncodeSettings::default(),
        }
    }

    #[test]
    fn test_silent_request_has_no_audio_graph() {
        let req = request(&[false, false]);
        let args = build_ffmpeg_args(&req);
        assert!(!args.iter().any(|a| a.contains("anullsrc")));
        assert!(!args.contains(&"[aout]".to_string()));
        assert!(!args.contains(&"aac".to_string()));
        let graph = build_filter_graph(&req);
        assert!(graph.ends_with("[v0][v1]concat=n=2:v=1:a=0[vout]"));
        assert_eq!(args.last().unwrap(), "/tmp/out/demo.mp4");
    }

    #[test]
    fn test_mixed_audio_synthesizes_silence() {
        let req = request(&[false, true, false]);
        let args = build_ffmpeg_args(&req);
        assert_eq!(args.iter().filter(|a| a.starts_with("anullsrc")).count(), 2);
        assert!(args.contains(&"/tmp/a/audio_1.mp3".to_string()));

        let graph = build_filter_graph(&req);
        // Audio inputs follow the three frame inputs.
        assert!(graph.contains("[3:a]"));
        assert!(graph.contains("[5:a]"));
        assert!(graph.contains("atrim=duration=5.000"));
        assert!(graph.ends_with("[v0][a0][v1][a1][v2][a2]concat=n=3:v=1:a=1[vout][aout]"));
    }

    #[test]
    fn test_codec_args_follow_settings() {
        let settings = EncodeSettings {
            preset: "veryfast".to_string(),
            ..EncodeSettings::default()
        };
        let args = codec_args(&settings, true);
        assert!(args.windows(2).any(|w| w == ["-preset", "veryfast"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-movflags", "+faststart"]));
    }

    #[test]
    fn test_progress_report_clamps_and_finishes() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2000000");
        let report = progress_report(&state, 96, 4.0, 1.0);
        assert_eq!(report.progress, 0.5);
        assert_eq!(report.frames_rendered, 48);
        assert_eq!(report.stage, ExportStage::Encoding);

        state.update("progress", "end");
        let done = progress_report(&state, 96, 4.0, 2.0);
        assert_eq!(done.progress, 1.0);
        assert_eq!(done.stage, ExportStage::Finalizing);
    }

    #[test]
    fn test_persisted_locator() {
        assert_eq!(
            Persisted::Remote("https://res.cloudinary.com/x.mp4".into()).locator(),
            "https://res.cloudinary.com/x.mp4"
        );
        assert_eq!(
            Persisted::Local(PathBuf::from("media/shorts/a.mp4")).locator(),
            "media/shorts/a.mp4"
        );
    }
}
