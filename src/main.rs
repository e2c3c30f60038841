use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use image::GrayImage;
use reframe::geometry::{Quad, ViewPoint, ViewQuad};
use reframe::matting::Preprocessor;
use reframe::{BrushMode, CancelToken, Editor, EditorConfig, Mode, OutputFormat, ViewStroke};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to edit
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the result
    #[arg(short, long)]
    output: PathBuf,

    /// Edit to apply, in order. Repeatable.
    ///
    /// rotate-left:DEG, rotate-right:DEG, flip-h, flip-v, scale:WxH,
    /// crop:L,T,R,B, perspective:X0,Y0,X1,Y1,X2,Y2,X3,Y3 (clockwise from
    /// top-left), remove-bg, refine-bg:fg|bg:RADIUS:X,Y;X,Y..., ml-remove-bg,
    /// undo, redo
    #[arg(long = "op", value_name = "OP")]
    ops: Vec<EditOp>,

    /// Output encoding
    #[arg(long, value_enum, default_value_t = Format::Keep)]
    format: Format,

    /// JPEG quality
    #[arg(long, default_value_t = reframe::codec::DEFAULT_JPEG_QUALITY)]
    quality: u8,

    /// Longest edge of the background cut working resolution
    #[arg(long, default_value_t = 800)]
    max_working_dim: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to foreground segmentation model (ONNX file)
    /// Required by ml-remove-bg
    #[cfg(feature = "onnx")]
    #[arg(long)]
    model: Option<PathBuf>,

    /// Write the alpha channel as a grayscale image instead of the edit
    #[arg(long)]
    show_mask: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Png,
    Webp,
    Jpeg,
    /// Same format as the input
    Keep,
}

#[derive(Debug, Clone)]
enum EditOp {
    RotateLeft(f64),
    RotateRight(f64),
    FlipHorizontal,
    FlipVertical,
    Scale(u32, u32),
    Crop([f64; 4]),
    Perspective([f64; 8]),
    RemoveBackground,
    RefineBackground(BrushMode, u32, Vec<(f64, f64)>),
    NeuralRemoveBackground,
    Undo,
    Redo,
}

impl FromStr for EditOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let arg = || arg.with_context(|| format!("`{name}` needs an argument"));
        Ok(match name {
            "rotate-left" => EditOp::RotateLeft(arg()?.parse().context("bad angle")?),
            "rotate-right" => EditOp::RotateRight(arg()?.parse().context("bad angle")?),
            "flip-h" => EditOp::FlipHorizontal,
            "flip-v" => EditOp::FlipVertical,
            "scale" => {
                let (w, h) = arg()?.split_once('x').context("scale expects WxH")?;
                EditOp::Scale(w.parse()?, h.parse()?)
            }
            "crop" => EditOp::Crop(numbers(arg()?)?),
            "perspective" => EditOp::Perspective(numbers(arg()?)?),
            "remove-bg" => EditOp::RemoveBackground,
            "refine-bg" => {
                let mut parts = arg()?.splitn(3, ':');
                let mode = match parts.next() {
                    Some("fg") => BrushMode::Foreground,
                    Some("bg") => BrushMode::Background,
                    other => bail!("brush mode must be fg or bg, got {:?}", other),
                };
                let radius = parts.next().context("missing radius")?.parse()?;
                let points = parts
                    .next()
                    .context("missing points")?
                    .split(';')
                    .map(|p| -> Result<(f64, f64)> {
                        let [x, y] = numbers::<2>(p)?;
                        Ok((x, y))
                    })
                    .collect::<Result<Vec<_>>>()?;
                EditOp::RefineBackground(mode, radius, points)
            }
            "ml-remove-bg" => EditOp::NeuralRemoveBackground,
            "undo" => EditOp::Undo,
            "redo" => EditOp::Redo,
            other => bail!("unknown op `{other}`"),
        })
    }
}

fn numbers<const N: usize>(s: &str) -> Result<[f64; N]> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("bad number list `{s}`"))?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| anyhow::anyhow!("expected {} numbers, got {}", N, v.len()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Reframe starting");

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let config = EditorConfig::default().with_max_working_dimension(args.max_working_dim);
    let mut editor = Editor::open(bytes)
        .context("Failed to decode input image")?
        .with_config(config);

    #[cfg(feature = "onnx")]
    if let Some(model_path) = &args.model {
        let model = reframe::matting::OnnxForegroundModel::new(model_path)
            .context("Failed to load foreground model")?;
        editor = editor.with_model(model);
    }

    for op in &args.ops {
        let start = Instant::now();
        apply(&mut editor, op).with_context(|| format!("Failed to apply {:?}", op))?;
        tracing::info!("{:?} took {:.1}ms", op, start.elapsed().as_secs_f64() * 1000.0);
    }

    let history = editor.history();
    tracing::info!("History: {} entries, pointer at {}", history.len(), history.pointer());
    for (i, command) in history.commands().iter().enumerate() {
        let marker = if i < history.pointer() { "*" } else { " " };
        tracing::info!("{} {}", marker, command);
    }

    let format = match args.format {
        Format::Png => OutputFormat::Png,
        Format::Webp => OutputFormat::WebP,
        Format::Jpeg => OutputFormat::Jpeg {
            quality: args.quality,
        },
        Format::Keep => OutputFormat::KeepSource,
    };
    let encoded = if args.show_mask {
        let raster = editor.document().raster();
        let alpha = GrayImage::from_fn(raster.width(), raster.height(), |x, y| {
            image::Luma([raster.get_pixel(x, y)[3]])
        });
        reframe::codec::encode(&Preprocessor::mask_to_rgba(&alpha), format, None)
    } else {
        editor.encode(format)
    }
    .context("Failed to encode output")?;

    std::fs::write(&args.output, encoded)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!("Wrote {}", args.output.display());

    Ok(())
}

fn apply(editor: &mut Editor, op: &EditOp) -> Result<()> {
    match op {
        EditOp::RotateLeft(angle) | EditOp::RotateRight(angle) => {
            editor.set_angle(*angle);
            let mode = if matches!(op, EditOp::RotateLeft(_)) {
                Mode::RotateLeft
            } else {
                Mode::RotateRight
            };
            editor.set_mode(mode)?;
        }
        EditOp::FlipHorizontal => editor.set_mode(Mode::FlipHorizontal)?,
        EditOp::FlipVertical => editor.set_mode(Mode::FlipVertical)?,
        EditOp::Scale(w, h) => {
            editor.set_scale(*w, *h);
            editor.set_mode(Mode::Scale)?;
        }
        EditOp::Crop([l, t, r, b]) => {
            editor.set_mode(Mode::Crop)?;
            let quad = Quad {
                top_left: reframe::ImagePoint::new(*l, *t),
                top_right: reframe::ImagePoint::new(*r, *t),
                bottom_right: reframe::ImagePoint::new(*r, *b),
                bottom_left: reframe::ImagePoint::new(*l, *b),
            };
            editor.commit_crop(&quad.to_view(1.0), 1.0)?;
        }
        EditOp::Perspective(c) => {
            editor.set_mode(Mode::PerspectiveCrop)?;
            let quad = ViewQuad {
                top_left: ViewPoint::new(c[0], c[1]),
                top_right: ViewPoint::new(c[2], c[3]),
                bottom_right: ViewPoint::new(c[4], c[5]),
                bottom_left: ViewPoint::new(c[6], c[7]),
            };
            editor.commit_crop(&quad, 1.0)?;
        }
        EditOp::RemoveBackground => editor.set_mode(Mode::RemoveBackground)?,
        EditOp::RefineBackground(mode, radius, points) => {
            editor.set_mode(Mode::RefineBackground)?;
            let points = points.iter().map(|&(x, y)| ViewPoint::new(x, y)).collect();
            editor.add_refine_stroke(ViewStroke::new(*mode, radius * 2, points), 1.0)?;
            editor.apply_refine()?;
        }
        EditOp::NeuralRemoveBackground => editor.remove_background_neural(&CancelToken::new())?,
        EditOp::Undo => editor.set_mode(Mode::Undo)?,
        EditOp::Redo => editor.set_mode(Mode::Redo)?,
    }
    Ok(())
}
