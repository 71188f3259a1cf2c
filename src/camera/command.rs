use crate::config::CameraConfig;
use std::fmt;

/// Program plus argument vector for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// V4L2 device encoded to H.264 and published over RTSP by a single encoder process.
pub fn usb_pipeline(config: &CameraConfig) -> Vec<CommandSpec> {
    let (width, height) = config.resolution;

    let encoder = CommandSpec::new(&config.encoder_binary)
        .args(["-hide_banner", "-loglevel", "warning"])
        .args(["-f", "v4l2"])
        .arg("-framerate")
        .arg(config.fps.to_string())
        .arg("-video_size")
        .arg(format!("{}x{}", width, height))
        .arg("-i")
        .arg(&config.device)
        // Many UVC cameras deliver 4:2:2; baseline H.264 needs 4:2:0
        .args(["-vf", "format=yuv420p"])
        .args(["-c:v", "libx264", "-preset", "veryfast", "-tune", "zerolatency"])
        .arg("-b:v")
        .arg(config.bitrate.to_string())
        .args(["-pix_fmt", "yuv420p", "-profile:v", "baseline", "-level", "3.1"])
        .args(["-f", "rtsp", "-rtsp_transport", "tcp", "-muxdelay", "0.1"])
        .arg(&config.rtsp_url);

    vec![encoder]
}

/// CSI sensor captured by the helper as raw H.264 on stdout, remuxed to RTSP by the encoder.
pub fn pi_pipeline(config: &CameraConfig) -> Vec<CommandSpec> {
    let (width, height) = config.resolution;

    let capture = CommandSpec::new(&config.capture_binary)
        .args(["--nopreview", "-t", "0"])
        .arg("--width")
        .arg(width.to_string())
        .arg("--height")
        .arg(height.to_string())
        .arg("--framerate")
        .arg(config.fps.to_string())
        .arg("--bitrate")
        .arg(config.bitrate.to_string())
        .arg("--inline")
        .args(["-o", "-"]);

    let encoder = CommandSpec::new(&config.encoder_binary)
        .args(["-hide_banner", "-loglevel", "warning"])
        .args(["-f", "h264", "-i", "pipe:0"])
        .args(["-c:v", "copy"])
        .args(["-f", "rtsp", "-rtsp_transport", "tcp"])
        .arg(&config.rtsp_url);

    vec![capture, encoder]
}
