use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use duet_audio::services::api::HttpGenerationApi;
use duet_audio::{
    ClientConfig, GenerationController, GenerationRequest, GenerationState, PlaybackPositionStore,
    RecordingId,
};

const CONFIG_PATH: &str = "duet-audio.json";

const USAGE: &str = "usage:
  duet-audio generate <recording-id> <user-voice> <assistant-voice>
  duet-audio position <recording-id>

voices: male-casual, male-formal, female-casual, female-formal";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = ClientConfig::load(Path::new(CONFIG_PATH))?.with_env_overrides();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["generate", recording, user, assistant] => {
            let request = GenerationRequest::new(*recording, user.parse()?, assistant.parse()?);
            generate(&config, request).await
        }
        ["position", recording] => {
            let store = PlaybackPositionStore::file(&config.playback.positions_path);
            match store.load(&RecordingId::from(*recording)) {
                Some(offset) => println!("{recording}: resume at {offset:.1}s"),
                None => println!("{recording}: starts from the beginning"),
            }
            Ok(())
        }
        _ => {
            eprintln!("{USAGE}");
            bail!("unrecognized arguments")
        }
    }
}

async fn generate(config: &ClientConfig, request: GenerationRequest) -> Result<()> {
    let api = Arc::new(HttpGenerationApi::from_config(config));
    let controller = Arc::new(GenerationController::new(api, config.poll.clone()));
    let mut updates = controller.subscribe();

    tracing::info!(
        "generating audio for {} ({} / {})",
        request.recording_id,
        request.user_voice,
        request.assistant_voice
    );

    let starter = Arc::clone(&controller);
    let started = tokio::spawn(async move { starter.start(request).await });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                controller.cancel();
                println!("cancelled");
                return Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                match view.state {
                    GenerationState::Requesting | GenerationState::Polling => {
                        println!("{:?} {}%", view.state, view.progress_percent);
                    }
                    GenerationState::Ready => {
                        if let Some(audio) = view.audio {
                            match audio.duration {
                                Some(d) => println!("ready: {} ({d:.0}s)", audio.url),
                                None => println!("ready: {}", audio.url),
                            }
                        }
                        break;
                    }
                    GenerationState::Failed | GenerationState::TimedOut => {
                        bail!(view.error_message().unwrap_or_else(|| "audio generation failed".to_string()));
                    }
                    GenerationState::Idle => {}
                }
            }
        }
    }

    started.await.context("generation task panicked")??;
    Ok(())
}
