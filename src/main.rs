//! Application entry point — audio digitizer.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Build the capture backend and the conversion client.
//! 5. Spawn the recorder orchestrator on the tokio runtime.
//! 6. Open the playback sink (degrades gracefully without a device).
//! 7. Run the terminal front end — blocks the main thread reading commands
//!    until `quit` or EOF.
//!
//! Playback stays on the main thread: `cpal` output streams are not `Send`
//! on every platform, so the [`PlaybackArbiter`] lives here and never
//! crosses into the runtime.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use audio_digitizer::{
    audio::{MicrophoneBackend, TimeRange},
    config::{AppConfig, AppPaths},
    convert::{new_shared_store, HttpConversionClient, ResultVariant, SharedVariantStore},
    playback::{CpalSink, PlaybackArbiter, PlaybackError},
    recorder::{new_shared_state, RecorderCommand, RecorderOrchestrator, RecorderState, SharedState},
};

// ---------------------------------------------------------------------------
// Terminal rendering
// ---------------------------------------------------------------------------

fn print_help() {
    println!("Comandos:");
    println!("  start            comenzar a grabar");
    println!("  stop             detener y convertir");
    println!("  sel A B          seleccionar el tramo A..B en segundos");
    println!("  sel off          quitar la selección");
    println!("  status           mostrar el estado actual");
    println!("  play N           reproducir el resultado N");
    println!("  replay           repetir la última reproducción");
    println!("  close [N]        detener la reproducción / cerrar el resultado N");
    println!("  save N [ruta]    guardar el resultado N");
    println!("  ack              descartar el aviso de error");
    println!("  quit             salir");
}

/// Elapsed seconds as `m:ss`, the shape the level meter shows next to.
fn format_elapsed(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "0:00".into();
    }
    let whole = secs as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// One block glyph per monitor level bar, quietest to loudest.
fn render_levels(levels: &[f32]) -> String {
    const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    levels
        .iter()
        .map(|level| {
            let idx = ((level * BARS.len() as f32) as usize).min(BARS.len() - 1);
            BARS[idx]
        })
        .collect()
}

fn print_variants(variants: &[ResultVariant]) {
    println!("  #  Formato  Bits  Tamaño");
    for (i, variant) in variants.iter().enumerate() {
        println!(
            "  {}  {:<7}  {:<4}  {:.2} KB",
            i + 1,
            variant.format.as_str(),
            variant.bit_depth.as_u8(),
            variant.size_kb()
        );
    }
}

fn print_status(state: &SharedState, playing: bool) {
    let st = state.lock().unwrap();
    println!("Estado: {}", st.recorder.label());

    match st.recorder {
        RecorderState::Recording => {
            if let Some(tap) = &st.monitor {
                let snap = tap.snapshot();
                println!(
                    "  {}  {}",
                    format_elapsed(snap.elapsed_secs),
                    render_levels(&snap.levels)
                );
            }
        }
        RecorderState::Results => {
            println!("  Grabación: {}", format_elapsed(st.recording_secs));
            print_variants(&st.variants);
        }
        _ => {}
    }

    if let Some(range) = st.selection {
        println!(
            "  Selección: {:.2}s..{:.2}s",
            range.start_secs, range.end_secs
        );
    }
    if let Some(notice) = &st.notice {
        println!("  Aviso: {}", notice.message);
    }
    if playing {
        println!("  Reproduciendo");
    }
}

/// User-facing message for a playback failure.
fn describe_playback_error(err: &PlaybackError) -> String {
    match err {
        PlaybackError::Unavailable(_) => "El resultado ya no está disponible".into(),
        PlaybackError::Media(_) => "No se pudo decodificar el audio recibido".into(),
        PlaybackError::Sink(_) => "No se pudo abrir la salida de audio".into(),
    }
}

// ---------------------------------------------------------------------------
// Command helpers
// ---------------------------------------------------------------------------

/// Copy variant `n` (1-based, as printed) out of the shared state.
fn variant_at(state: &SharedState, n: usize) -> Option<ResultVariant> {
    let st = state.lock().unwrap();
    n.checked_sub(1).and_then(|i| st.variants.get(i).cloned())
}

fn save_variant(
    store: &SharedVariantStore,
    variant: &ResultVariant,
    path_arg: Option<&str>,
) {
    let payload = {
        let guard = match store.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.resolve(variant.handle)
    };
    let payload = match payload {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("save failed: {e}");
            println!("El resultado ya no está disponible");
            return;
        }
    };

    let path = match path_arg {
        Some(arg) => PathBuf::from(arg),
        None => AppPaths::new()
            .downloads_dir
            .join(variant.suggested_filename()),
    };

    match std::fs::write(&path, payload.as_ref()) {
        Ok(()) => println!("Guardado en {}", path.display()),
        Err(e) => {
            log::error!("could not write {}: {e}", path.display());
            println!("No se pudo guardar: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Audio digitizer starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    log::info!("Conversion endpoint: {}", config.api.convert_url());

    // 3. Tokio runtime (2 workers — orchestrator plus its notice timers)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Shared state, variant store, backends
    let store = new_shared_store();
    let state = new_shared_state(config.clone());

    let backend = Arc::new(MicrophoneBackend::new(
        config.capture.clone(),
        config.ui.monitor_bars,
    ));
    let service = Arc::new(HttpConversionClient::from_config(&config.api, store.clone()));

    // 5. Recorder orchestrator on the runtime
    let (command_tx, command_rx) = mpsc::channel::<RecorderCommand>(16);
    let orchestrator = RecorderOrchestrator::new(
        state.clone(),
        backend,
        service,
        store.clone(),
        &command_tx,
    );
    let recorder_task = rt.spawn(orchestrator.run(command_rx));

    // 6. Playback sink — the app still runs without an output device, the
    //    play commands just report it missing.
    let mut arbiter: Option<PlaybackArbiter<CpalSink>> = match CpalSink::open() {
        Ok(sink) => Some(PlaybackArbiter::new(store.clone(), sink)),
        Err(e) => {
            log::warn!("Audio output unavailable: {e}");
            None
        }
    };

    // 7. Terminal front end
    println!("Digitalizador de audio. Escriba 'help' para ver los comandos.");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };

        match cmd {
            "start" => {
                let _ = command_tx.blocking_send(RecorderCommand::Start);
            }
            "stop" => {
                let _ = command_tx.blocking_send(RecorderCommand::Stop);
            }
            "sel" => match (parts.next(), parts.next()) {
                (Some("off"), _) => {
                    let _ = command_tx.blocking_send(RecorderCommand::SetSelection(None));
                }
                (Some(a), Some(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
                    (Ok(start), Ok(end)) => {
                        let range = TimeRange::new(start, end);
                        let _ =
                            command_tx.blocking_send(RecorderCommand::SetSelection(Some(range)));
                    }
                    _ => println!("Uso: sel A B  (segundos)"),
                },
                _ => println!("Uso: sel A B | sel off"),
            },
            "status" => {
                let playing = arbiter.as_ref().is_some_and(|a| a.is_playing());
                print_status(&state, playing);
            }
            "play" => match parts.next().and_then(|s| s.parse::<usize>().ok()) {
                Some(n) => match variant_at(&state, n) {
                    Some(variant) => match arbiter.as_mut() {
                        Some(arb) => match arb.play(&variant) {
                            Ok(()) => println!("Reproduciendo {}", variant.suggested_filename()),
                            Err(e) => {
                                log::error!("playback failed: {e}");
                                println!("{}", describe_playback_error(&e));
                            }
                        },
                        None => println!("Salida de audio no disponible"),
                    },
                    None => println!("No hay resultado {n}"),
                },
                None => println!("Uso: play N"),
            },
            "replay" => match arbiter.as_mut() {
                Some(arb) => match arb.replay() {
                    Ok(true) => println!("Repitiendo"),
                    Ok(false) => println!("No hay nada que repetir"),
                    Err(e) => {
                        log::error!("replay failed: {e}");
                        println!("{}", describe_playback_error(&e));
                    }
                },
                None => println!("Salida de audio no disponible"),
            },
            "close" => match parts.next().and_then(|s| s.parse::<usize>().ok()) {
                Some(n) => match variant_at(&state, n) {
                    Some(variant) => {
                        let stopped = arbiter
                            .as_mut()
                            .is_some_and(|arb| arb.dismiss(variant.handle));
                        if stopped {
                            println!("Resultado {n} cerrado; reproducción detenida");
                        } else {
                            println!("Resultado {n} cerrado");
                        }
                    }
                    None => println!("No hay resultado {n}"),
                },
                None => {
                    if let Some(arb) = arbiter.as_mut() {
                        arb.stop();
                    }
                    println!("Reproducción detenida");
                }
            },
            "save" => match parts.next().and_then(|s| s.parse::<usize>().ok()) {
                Some(n) => match variant_at(&state, n) {
                    Some(variant) => save_variant(&store, &variant, parts.next()),
                    None => println!("No hay resultado {n}"),
                },
                None => println!("Uso: save N [ruta]"),
            },
            "ack" => {
                let _ = command_tx.blocking_send(RecorderCommand::AcknowledgeError);
            }
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("Comando desconocido: {other}. Escriba 'help'."),
        }
    }

    // Close the channel so the orchestrator drains and shuts down.
    if let Some(arb) = arbiter.as_mut() {
        arb.stop();
    }
    drop(command_tx);
    let _ = rt.block_on(recorder_task);
    log::info!("Audio digitizer shut down");

    Ok(())
}
