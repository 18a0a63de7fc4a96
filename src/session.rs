use crate::cli::TransportMode;
use crate::endpoint;
use crate::render::SlotGeometry;
use crate::stream::{SlotCell, StreamEnd};
use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use futures_util::StreamExt;
use openh264::decoder::Decoder;
use openh264::formats::YUVSource;
use retina::client::{
    Demuxed, PlayOptions, Session, SessionOptions, SetupOptions, TcpTransportOptions, Transport,
    UdpTransportOptions,
};
use retina::codec::{CodecItem, ParametersRef};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

/// A playing RTSP session, demuxed and positioned on its H264 video stream.
/// Produced by [`connect`] and consumed by [`run_slot_worker`].
pub struct ConnectedStream {
    demuxed: Demuxed,
    stream_index: usize,
}

/// Runs DESCRIBE/SETUP/PLAY against `stream_url` and returns the demuxed
/// session. Credentials ride in the URL userinfo; they are stripped before
/// the request and handed to the session separately.
pub async fn connect(stream_url: &str, transport_mode: TransportMode) -> Result<ConnectedStream> {
    let mut parsed = Url::parse(stream_url).context("invalid RTSP URL")?;

    let creds = endpoint::extract_credentials(&parsed);
    if !parsed.username().is_empty() {
        parsed
            .set_username("")
            .map_err(|()| anyhow!("failed stripping username from RTSP URL"))?;
    }
    if parsed.password().is_some() {
        parsed
            .set_password(None)
            .map_err(|()| anyhow!("failed stripping password from RTSP URL"))?;
    }

    let mut session_options = SessionOptions::default();
    if let Some(credentials) = creds {
        session_options = session_options.creds(Some(credentials));
    }

    let mut session = Session::describe(parsed, session_options)
        .await
        .context("RTSP DESCRIBE failed")?;

    let stream_index = pick_h264_stream(&session)?;
    session
        .setup(
            stream_index,
            SetupOptions::default().transport(to_transport(transport_mode)),
        )
        .await
        .context("RTSP SETUP failed")?;

    let playing = session
        .play(PlayOptions::default())
        .await
        .context("RTSP PLAY failed")?;

    let demuxed = playing.demuxed().context("RTSP demux setup failed")?;

    Ok(ConnectedStream {
        demuxed,
        stream_index,
    })
}

/// Drives one stream until it ends, publishing decoded frames into `cell`.
/// The outcome lands in the cell as a terminal state; this function never
/// reconnects.
pub async fn run_slot_worker(
    connected: ConnectedStream,
    cell: Arc<SlotCell>,
    geometry_rx: watch::Receiver<SlotGeometry>,
) {
    match stream_frames(connected, &cell, geometry_rx).await {
        Ok(()) => cell.finish(StreamEnd::EndOfStream),
        Err(err) => cell.finish(StreamEnd::ReadFailure(format!("{err:#}"))),
    }
}

async fn stream_frames(
    connected: ConnectedStream,
    cell: &SlotCell,
    geometry_rx: watch::Receiver<SlotGeometry>,
) -> Result<()> {
    let ConnectedStream {
        mut demuxed,
        stream_index,
    } = connected;

    let mut decoder = Decoder::new().context("failed to initialize H264 decoder")?;
    if let Some(extra_config) = read_h264_extra_config(&demuxed, stream_index) {
        let _ = decoder.decode(&extra_config);
    }

    let mut annexb_buffer = Vec::with_capacity(4096);
    let mut rgb_buffer = Vec::new();
    let mut scaler = RgbScaler::default();

    cell.set_status("streaming");

    while let Some(item) = demuxed.next().await {
        let item = item.context("demux receive failed")?;

        let CodecItem::VideoFrame(frame) = item else {
            continue;
        };
        if frame.stream_id() != stream_index {
            continue;
        }

        if frame.has_new_parameters()
            && let Some(extra_config) = read_h264_extra_config(&demuxed, stream_index)
        {
            let _ = decoder.decode(&extra_config);
        }

        if let Err(err) = avcc_frame_to_annexb(frame.data(), &mut annexb_buffer) {
            cell.inc_decode_error();
            cell.set_status(format!("frame convert error: {err:#}"));
            continue;
        }

        match decoder.decode(&annexb_buffer) {
            Ok(Some(yuv)) => {
                let geometry = *geometry_rx.borrow();
                let (src_w, src_h) = yuv.dimensions();
                let Some((out_w, out_h)) =
                    resolved_output_dims(src_w, src_h, geometry.width, geometry.height)
                else {
                    continue;
                };

                if out_w == src_w && out_h == src_h {
                    rgb_buffer.resize(yuv.estimate_rgb_u8_size(), 0);
                    // openh264's built-in converter uses SIMD where available.
                    yuv.write_rgb8(&mut rgb_buffer);
                    cell.publish(&mut rgb_buffer, src_w, src_h);
                    continue;
                }

                scaler.src_rgb.resize(yuv.estimate_rgb_u8_size(), 0);
                yuv.write_rgb8(&mut scaler.src_rgb);
                match resize_rgb(&mut scaler, src_w, src_h, out_w, out_h, &mut rgb_buffer) {
                    Ok(()) => cell.publish(&mut rgb_buffer, out_w, out_h),
                    Err(err) => {
                        cell.inc_decode_error();
                        cell.set_status(format!("scale error: {err:#}"));
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                cell.inc_decode_error();
                cell.set_status(format!("decode error: {err}"));
            }
        }
    }

    Ok(())
}

fn pick_h264_stream(session: &Session<retina::client::Described>) -> Result<usize> {
    session
        .streams()
        .iter()
        .enumerate()
        .find(|(_, stream)| stream.media() == "video" && stream.encoding_name() == "h264")
        .map(|(idx, _)| idx)
        .ok_or_else(|| anyhow!("no H264 video stream found in RTSP presentation"))
}

fn to_transport(mode: TransportMode) -> Transport {
    match mode {
        TransportMode::Tcp => Transport::Tcp(TcpTransportOptions::default()),
        TransportMode::Udp => Transport::Udp(UdpTransportOptions::default()),
    }
}

fn read_h264_extra_config(demuxed: &Demuxed, stream_index: usize) -> Option<Vec<u8>> {
    let stream = demuxed.streams().get(stream_index)?;
    let ParametersRef::Video(video_params) = stream.parameters()? else {
        return None;
    };

    avcc_extra_data_to_annexb(video_params.extra_data()).ok()
}

fn avcc_frame_to_annexb(input: &[u8], output: &mut Vec<u8>) -> Result<()> {
    output.clear();

    let mut cursor = 0_usize;
    while cursor + 4 <= input.len() {
        let nal_len = u32::from_be_bytes([
            input[cursor],
            input[cursor + 1],
            input[cursor + 2],
            input[cursor + 3],
        ]) as usize;
        cursor += 4;

        if cursor + nal_len > input.len() {
            return Err(anyhow!("invalid AVCC frame: NAL length exceeds payload"));
        }

        output.extend_from_slice(&[0, 0, 0, 1]);
        output.extend_from_slice(&input[cursor..cursor + nal_len]);
        cursor += nal_len;
    }

    if cursor != input.len() {
        return Err(anyhow!("invalid AVCC frame: trailing bytes"));
    }

    Ok(())
}

fn avcc_extra_data_to_annexb(extra: &[u8]) -> Result<Vec<u8>> {
    if extra.len() < 7 {
        return Err(anyhow!("AVCC extradata too short"));
    }

    let mut cursor = 5_usize;
    let mut output = Vec::with_capacity(extra.len() + 32);

    let sps_count = usize::from(extra[cursor] & 0x1f);
    cursor += 1;

    for _ in 0..sps_count {
        if cursor + 2 > extra.len() {
            return Err(anyhow!("AVCC SPS length missing"));
        }
        let len = usize::from(u16::from_be_bytes([extra[cursor], extra[cursor + 1]]));
        cursor += 2;
        if cursor + len > extra.len() {
            return Err(anyhow!("AVCC SPS payload exceeds size"));
        }

        output.extend_from_slice(&[0, 0, 0, 1]);
        output.extend_from_slice(&extra[cursor..cursor + len]);
        cursor += len;
    }

    if cursor >= extra.len() {
        return Err(anyhow!("AVCC PPS count missing"));
    }

    let pps_count = usize::from(extra[cursor]);
    cursor += 1;

    for _ in 0..pps_count {
        if cursor + 2 > extra.len() {
            return Err(anyhow!("AVCC PPS length missing"));
        }
        let len = usize::from(u16::from_be_bytes([extra[cursor], extra[cursor + 1]]));
        cursor += 2;
        if cursor + len > extra.len() {
            return Err(anyhow!("AVCC PPS payload exceeds size"));
        }

        output.extend_from_slice(&[0, 0, 0, 1]);
        output.extend_from_slice(&extra[cursor..cursor + len]);
        cursor += len;
    }

    Ok(output)
}

/// Caps the publish size at the source size so frames are never upscaled,
/// and keeps both dimensions even for the decoder-to-RGB path.
fn resolved_output_dims(
    src_width: usize,
    src_height: usize,
    target_width: usize,
    target_height: usize,
) -> Option<(usize, usize)> {
    if src_width == 0 || src_height == 0 || target_width == 0 || target_height == 0 {
        return None;
    }

    let output_width = target_width.min(src_width).max(2) & !1;
    let output_height = target_height.min(src_height).max(2) & !1;
    Some((output_width, output_height))
}

struct RgbScaler {
    resizer: fir::Resizer,
    options: fir::ResizeOptions,
    src_rgb: Vec<u8>,
}

impl Default for RgbScaler {
    fn default() -> Self {
        Self {
            resizer: fir::Resizer::new(),
            options: fir::ResizeOptions::new()
                .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear)),
            src_rgb: Vec::new(),
        }
    }
}

fn resize_rgb(
    scaler: &mut RgbScaler,
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    let dst_needed = dst_width.saturating_mul(dst_height).saturating_mul(3);
    out.resize(dst_needed, 0);

    let src_image = fir::images::Image::from_slice_u8(
        src_width as u32,
        src_height as u32,
        scaler.src_rgb.as_mut_slice(),
        fir::PixelType::U8x3,
    )
    .context("failed creating resize source image")?;
    let mut dst_image = fir::images::Image::from_slice_u8(
        dst_width as u32,
        dst_height as u32,
        out.as_mut_slice(),
        fir::PixelType::U8x3,
    )
    .context("failed creating resize destination image")?;

    scaler
        .resizer
        .resize(&src_image, &mut dst_image, Some(&scaler.options))
        .context("frame resize failed")
}
