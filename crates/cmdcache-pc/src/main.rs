//! Command cache demo.
//!
//! Records the draw commands of a group of models once, then every frame
//! patches each model's transform into the recording, appends it to the frame
//! list and replays it through the software backend, checking that every draw
//! saw the matrix patched for it.

use clap::Parser;
use glam::{Mat4, Vec3};
use std::process;

use cmdcache_core::cache::report::CommandListUsage;
use cmdcache_core::gpu::registers::MAX_MODELS;
use cmdcache_core::gpu::CommandEncoder;
use cmdcache_core::{
    AppendMode, CacheConfig, CacheError, CommandCache, CommandList, FrameCommandList, StateMask,
};
use cmdcache_pc::{ListId, SoftwareCommandLists, SoftwareError, UniformFile};

/// Register whose writes stand in for a draw kick.
const DRAW_KICK: u16 = 0x22F;
/// First float register of the model-view matrix.
const MODEL_VIEW_REGISTER: u8 = 0;
/// First float register of the projection matrix.
const PROJECTION_REGISTER: u8 = 4;

#[derive(Parser)]
#[command(name = "cmdcache-demo")]
#[command(
    about = "Record a draw sequence once and replay it with patched uniform matrices",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Number of models sharing the recording
    #[arg(short, long, default_value = "4")]
    models: usize,

    /// Number of frames to replay
    #[arg(short, long, default_value = "3")]
    frames: u32,

    /// Byte capacity of the recording and frame lists
    #[arg(long, default_value = "0x10000", value_parser = parse_u32)]
    buffer_size: u32,

    /// Request capacity of the recording and frame lists
    #[arg(long, default_value = "32")]
    request_capacity: u32,

    /// Reference the recording instead of copying it into the frame list
    #[arg(long)]
    reference: bool,

    /// Total bytes of list storage the backend may allocate
    #[arg(long, default_value = "0x100000", value_parser = parse_usize)]
    budget: usize,

    /// Suppress progress output (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    parse_usize(s)?.try_into().map_err(|_| format!("{s} does not fit in 32 bits"))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid size {s}: {e}"))
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Cache(#[from] CacheError<SoftwareError>),

    #[error(transparent)]
    Backend(#[from] SoftwareError),

    #[error("model count {count} must be between 1 and {max}")]
    ModelCount { count: usize, max: usize },

    #[error("frame {frame}: draw {draw} saw the wrong {name} matrix")]
    Mismatch {
        frame: u32,
        draw: usize,
        name: &'static str,
    },

    #[error("frame {frame}: {restores} state restores recorded, {expected} expected")]
    StateRestores {
        frame: u32,
        restores: usize,
        expected: usize,
    },

    #[error("frame {frame}: {actual} draws executed, {expected} expected")]
    DrawCount {
        frame: u32,
        actual: usize,
        expected: usize,
    },
}

fn model_matrix(frame: u32, model: usize) -> Mat4 {
    let angle = frame as f32 * 0.25 + model as f32;
    Mat4::from_translation(Vec3::new(model as f32 * 2.0, 0.0, -10.0)) * Mat4::from_rotation_y(angle)
}

fn projection() -> Mat4 {
    Mat4::perspective_rh(60f32.to_radians(), 4.0 / 3.0, 0.1, 100.0)
}

fn record(
    cache: &mut CommandCache<ListId>,
    lists: &mut SoftwareCommandLists,
    models: usize,
) -> Result<(), DemoError> {
    cache.begin_save(lists)?;

    let mut enc = CommandEncoder::new();
    for model in 0..models {
        cache.save_command_buffer_start_offset(&*lists, model);

        enc.clear();
        enc.uniform_matrix(MODEL_VIEW_REGISTER, &Mat4::IDENTITY);
        if model == 0 {
            enc.uniform_matrix(PROJECTION_REGISTER, &Mat4::IDENTITY);
        }
        enc.single(DRAW_KICK, model as u32);
        lists.push_commands(enc.as_bytes())?;
    }

    cache.end_save(lists)?;
    Ok(())
}

fn verify(frame: u32, executor: &UniformFile, models: usize) -> Result<(), DemoError> {
    let draws = executor.draws();
    if draws.len() != models {
        return Err(DemoError::DrawCount {
            frame,
            actual: draws.len(),
            expected: models,
        });
    }

    for (draw, snapshot) in draws.iter().enumerate() {
        if snapshot.matrix(MODEL_VIEW_REGISTER as u32) != model_matrix(frame, draw) {
            return Err(DemoError::Mismatch {
                frame,
                draw,
                name: "model-view",
            });
        }
        if snapshot.matrix(PROJECTION_REGISTER as u32) != projection() {
            return Err(DemoError::Mismatch {
                frame,
                draw,
                name: "projection",
            });
        }
    }

    Ok(())
}

fn run(args: &Args) -> Result<(), DemoError> {
    if !(1..=MAX_MODELS).contains(&args.models) {
        return Err(DemoError::ModelCount {
            count: args.models,
            max: MAX_MODELS,
        });
    }

    let mut lists = SoftwareCommandLists::new(args.budget)
        .with_executor(UniformFile::new().with_kick(DRAW_KICK));

    let mut frame_list = FrameCommandList::new();
    frame_list.initialize(&mut lists, args.buffer_size, args.request_capacity, false)?;

    let append_mode = if args.reference {
        AppendMode::Reference
    } else {
        AppendMode::Copy
    };

    let mut cache = CommandCache::new();
    cache.initialize(CacheConfig {
        buffer_size: args.buffer_size,
        request_capacity: args.request_capacity,
        append_mode,
        state_mask: StateMask::ALL,
        model_count: args.models,
    });
    for model in 0..args.models {
        cache.set_vs_uniform_matrix_register_index(model, 0, MODEL_VIEW_REGISTER as u32);
    }
    cache.set_vs_uniform_matrix_register_index(0, 1, PROJECTION_REGISTER as u32);

    record(&mut cache, &mut lists, args.models)?;
    cache.report().log();

    for frame in 0..args.frames {
        frame_list.wait(&mut lists)?;
        lists.executor_mut().clear_draws();

        cache.update_vs_uniform_matrix(&mut lists, 0, 1, &projection())?;
        for model in 0..args.models {
            cache.update_vs_uniform_matrix(&mut lists, model, 0, &model_matrix(frame, model))?;
        }

        cache.append(&mut lists)?;
        let expected = frame as usize + 1;
        if lists.state_restores() != expected
            || !lists.restored_states().contains(StateMask::ALL)
        {
            return Err(DemoError::StateRestores {
                frame,
                restores: lists.state_restores(),
                expected,
            });
        }
        CommandListUsage::current(&lists).log();
        frame_list.run(&mut lists)?;

        verify(frame, lists.executor(), args.models)?;
        log::info!("frame {frame}: {} draws verified", args.models);

        frame_list.swap(&mut lists)?;
    }

    cache.finalize(&mut lists);
    frame_list.finalize(&mut lists);

    log::info!(
        "done: {} bytes executed, 0x{:X} bytes still allocated",
        lists.executor().executed_bytes(),
        lists.allocated_bytes()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    if !args.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    if let Err(e) = run(&args) {
        log::error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
