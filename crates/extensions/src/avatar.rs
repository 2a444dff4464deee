//! Avatar extension: uploads and sets the bot's profile picture.

use std::path::Path;

use {
    bramble_core::{BusEvent, ExtensionBehavior, ExtensionContext, ExtensionError},
    serde_json::{Value, json},
    tokio::sync::broadcast::error::RecvError,
    tracing::{info, warn},
};

use crate::error::Error;

/// Sets the account avatar from a local image file once the host connects.
///
/// Options:
/// - `avatar_file`: path to the image to upload (required for any effect),
/// - `force`: upload even when the account already has an avatar.
#[derive(Debug, Clone, Copy, Default)]
pub struct Avatar;

impl ExtensionBehavior for Avatar {
    type Ctx = ();

    fn name(&self) -> &'static str {
        "avatar"
    }

    fn description(&self) -> &'static str {
        "Uploads and sets the bot's avatar image after connecting"
    }

    fn defaults(&self) -> Value {
        json!({
            "avatar_file": null,
            "force": false,
        })
    }

    fn bind_listeners(&self, ext: &ExtensionContext<()>) -> Result<(), ExtensionError> {
        let mut bus = ext.handle().subscribe();
        let ext = ext.clone();

        tokio::spawn(async move {
            loop {
                match bus.recv().await {
                    Ok(BusEvent::Connect) => {
                        if let Err(error) = ensure_avatar(&ext).await {
                            ext.span().in_scope(|| warn!(%error, "failed to set avatar"));
                        }
                    },
                    Ok(_) => {},
                    Err(RecvError::Lagged(skipped)) => {
                        ext.span().in_scope(|| warn!(skipped, "bus lagged"));
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(())
    }
}

/// Upload the configured image and point the account avatar at it, unless an
/// avatar already exists and `force` is off.
async fn ensure_avatar(ext: &ExtensionContext<()>) -> Result<(), Error> {
    let transport = ext.handle().transport()?;
    let user = ext
        .handle()
        .user_id()
        .ok_or_else(|| Error::message("host has been torn down"))?;

    let force = ext
        .options()
        .get("force")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !force && transport.avatar_url(&user).await?.is_some() {
        return Ok(());
    }

    let path = ext
        .options()
        .get("avatar_file")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::message("invalid or missing avatar_file option"))?;
    let data = tokio::fs::read(path).await?;
    let content_type = content_type_for(Path::new(path));

    let uri = transport.upload_content(data, content_type).await?;
    ext.span().in_scope(|| info!(%uri, "uploaded avatar image"));
    transport.set_avatar_url(&uri).await?;
    Ok(())
}

/// MIME type from the file extension; the transport gets a generic binary
/// type for anything unrecognized.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        std::{io::Write, sync::Arc, time::Duration},
        tokio::time::sleep,
    };

    use {
        super::*,
        bramble_core::{Extension, Host, HostConfig, testing::MemoryTransport},
    };

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..40 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(25)).await;
        }
        false
    }

    fn avatar_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"not really a png").unwrap();
        file
    }

    #[test]
    fn content_types_from_extension() {
        assert_eq!(content_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("mystery")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn uploads_and_sets_avatar_on_connect() {
        let file = avatar_file();
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        let avatar = Extension::build(
            &host.handle(),
            Avatar,
            json!({"avatar_file": file.path().to_str().unwrap()}),
        )
        .unwrap();
        host.register([avatar]).unwrap();

        host.connect().await.unwrap();

        assert!(wait_until(|| transport.current_avatar().is_some()).await);
        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].content_type, "image/png");
    }

    #[tokio::test]
    async fn existing_avatar_is_left_alone() {
        let file = avatar_file();
        let transport = Arc::new(MemoryTransport::new());
        transport.set_existing_avatar("mem://content/original");
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        let avatar = Extension::build(
            &host.handle(),
            Avatar,
            json!({"avatar_file": file.path().to_str().unwrap()}),
        )
        .unwrap();
        host.register([avatar]).unwrap();

        host.connect().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        assert!(transport.uploads().is_empty());
        assert_eq!(
            transport.current_avatar().as_deref(),
            Some("mem://content/original")
        );
    }

    #[tokio::test]
    async fn force_replaces_an_existing_avatar() {
        let file = avatar_file();
        let transport = Arc::new(MemoryTransport::new());
        transport.set_existing_avatar("mem://content/original");
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        let avatar = Extension::build(
            &host.handle(),
            Avatar,
            json!({"avatar_file": file.path().to_str().unwrap(), "force": true}),
        )
        .unwrap();
        host.register([avatar]).unwrap();

        host.connect().await.unwrap();

        assert!(wait_until(|| !transport.uploads().is_empty()).await);
    }

    #[tokio::test]
    async fn missing_avatar_file_fails_soft() {
        let transport = Arc::new(MemoryTransport::new());
        let host = Host::new(HostConfig::new("@bot:example.org"), transport.clone());

        // No avatar_file configured at all.
        let avatar = Extension::build(&host.handle(), Avatar, json!({})).unwrap();
        host.register([avatar]).unwrap();

        host.connect().await.unwrap();
        sleep(Duration::from_millis(100)).await;

        assert!(transport.uploads().is_empty());
        assert!(transport.current_avatar().is_none());
    }
}
