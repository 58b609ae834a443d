//! Service adapters: entry URLs, TV user agents, allowed hosts, and
//! partition names per streaming service.
//!
//! A pure lookup from an arbitrary URL to the configuration the shell
//! needs: which storage partition to mount, whether playback must go
//! through the DRM engine, and which user agent coaxes out the 10-foot UI.

use settop_runtime::Session;

/// Android TV user agent; triggers TV layouts on several services.
const ANDROID_TV_UA: &str = "Mozilla/5.0 (Linux; Android 10; BRAVIA 4K UR3 Build/QTG3.200305.006; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/120.0.0.0 Safari/537.36 CrKey/1.56.500000";

/// Static adapter for one known service.
pub struct ServiceAdapter {
	pub key: &'static str,
	/// Hostnames that identify the service (subdomains included).
	pub hosts: &'static [&'static str],
	/// Default entry URL when opened from the home screen.
	pub entry: &'static str,
	/// TV-friendly user agent, when one helps. DRM services keep the
	/// default UA: spoofing breaks license exchange.
	pub tv_user_agent: Option<&'static str>,
	/// Storage partition name.
	pub partition: &'static str,
	/// Hostnames navigation may stay inside (login flows, CDNs).
	pub allowed_hosts: &'static [&'static str],
	/// Whether playback requires the out-of-process DRM engine.
	pub drm: bool,
	/// Service-specific play/pause key, when not space.
	pub play_key: Option<&'static str>,
}

const SERVICES: &[ServiceAdapter] = &[
	ServiceAdapter {
		key: "youtube",
		hosts: &["youtube.com", "youtu.be"],
		entry: "https://www.youtube.com/tv",
		tv_user_agent: Some(ANDROID_TV_UA),
		partition: "yt",
		allowed_hosts: &["youtube.com", "youtu.be", "google.com", "accounts.google.com", "gstatic.com"],
		drm: false,
		play_key: Some("k"),
	},
	ServiceAdapter {
		key: "netflix",
		hosts: &["netflix.com"],
		entry: "https://www.netflix.com/browse",
		tv_user_agent: None,
		partition: "netflix",
		allowed_hosts: &["netflix.com", "nflxvideo.net", "nflximg.net", "nflxext.com", "nflxso.net"],
		drm: true,
		play_key: None,
	},
	ServiceAdapter {
		key: "prime",
		hosts: &["primevideo.com", "amazon.com"],
		entry: "https://www.primevideo.com",
		tv_user_agent: None,
		partition: "prime",
		allowed_hosts: &["primevideo.com", "amazon.com", "aiv-cdn.net", "media-amazon.com", "amazonaws.com"],
		drm: true,
		play_key: None,
	},
	ServiceAdapter {
		key: "disney",
		hosts: &["disneyplus.com"],
		entry: "https://www.disneyplus.com",
		tv_user_agent: None,
		partition: "disney",
		allowed_hosts: &["disneyplus.com", "bamgrid.com", "dssott.com"],
		drm: true,
		play_key: None,
	},
	ServiceAdapter {
		key: "spotify",
		hosts: &["spotify.com"],
		entry: "https://open.spotify.com",
		tv_user_agent: None,
		partition: "spotify",
		allowed_hosts: &["spotify.com", "open.spotify.com", "accounts.spotify.com"],
		drm: false,
		play_key: None,
	},
	ServiceAdapter {
		key: "twitch",
		hosts: &["twitch.tv"],
		entry: "https://www.twitch.tv",
		tv_user_agent: Some(ANDROID_TV_UA),
		partition: "twitch",
		allowed_hosts: &["twitch.tv", "id.twitch.tv", "ttvnw.net"],
		drm: false,
		play_key: None,
	},
	ServiceAdapter {
		key: "plex",
		hosts: &["plex.tv"],
		entry: "https://app.plex.tv",
		tv_user_agent: Some(ANDROID_TV_UA),
		partition: "plex",
		allowed_hosts: &["plex.tv", "app.plex.tv", "the.plex.tv"],
		drm: false,
		play_key: None,
	},
];

/// Resolved configuration for an arbitrary URL. Unknown hosts fall back to
/// a same-host allowlist on the shared `apps` partition, no DRM.
pub struct ServiceConfig {
	pub key: Option<&'static str>,
	pub user_agent: Option<&'static str>,
	pub partition: String,
	pub allowed_hosts: Vec<String>,
	pub drm: bool,
	pub play_key: Option<&'static str>,
}

/// Infers the service configuration for any URL.
pub fn resolve_service_for_url(url: &str) -> ServiceConfig {
	let host = url::Url::parse(url)
		.ok()
		.and_then(|u| u.host_str().map(str::to_owned))
		.unwrap_or_default();

	let adapter = SERVICES
		.iter()
		.find(|s| s.hosts.iter().any(|h| host == *h || host.ends_with(&format!(".{h}"))));

	match adapter {
		Some(adapter) => ServiceConfig {
			key: Some(adapter.key),
			user_agent: adapter.tv_user_agent,
			partition: adapter.partition.to_string(),
			allowed_hosts: adapter.allowed_hosts.iter().map(|h| h.to_string()).collect(),
			drm: adapter.drm,
			play_key: adapter.play_key,
		},
		None => ServiceConfig {
			key: None,
			user_agent: None,
			partition: "apps".to_string(),
			allowed_hosts: if host.is_empty() { Vec::new() } else { vec![host] },
			drm: false,
			play_key: None,
		},
	}
}

/// Entry URL for a service key, if known.
pub fn service_entry(key: &str) -> Option<&'static str> {
	SERVICES.iter().find(|s| s.key == key).map(|s| s.entry)
}

/// Builds the DRM session for a URL, when the service needs the engine.
pub fn drm_session_for_url(url: &str) -> Option<Session> {
	let config = resolve_service_for_url(url);
	if !config.drm {
		return None;
	}
	let mut session = Session::new(config.key?, url);
	session.session_key = config.partition;
	session.fullscreen = true;
	session.display = Some("primary".to_string());
	session.user_agent = config.user_agent.map(str::to_owned);
	Some(session)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_hosts_resolve_with_subdomains() {
		let config = resolve_service_for_url("https://www.netflix.com/watch/1234");
		assert_eq!(config.key, Some("netflix"));
		assert!(config.drm);
		assert_eq!(config.partition, "netflix");

		let config = resolve_service_for_url("https://youtu.be/abc");
		assert_eq!(config.key, Some("youtube"));
		assert!(!config.drm);
		assert_eq!(config.play_key, Some("k"));
	}

	#[test]
	fn unknown_hosts_fall_back_to_same_host() {
		let config = resolve_service_for_url("https://example.org/show");
		assert_eq!(config.key, None);
		assert_eq!(config.partition, "apps");
		assert_eq!(config.allowed_hosts, vec!["example.org".to_string()]);
		assert!(!config.drm);
	}

	#[test]
	fn drm_session_carries_partition_and_fullscreen() {
		let session = drm_session_for_url("https://www.disneyplus.com/home").unwrap();
		assert_eq!(session.service_key, "disney");
		assert_eq!(session.session_key, "disney");
		assert!(session.fullscreen);

		assert!(drm_session_for_url("https://www.twitch.tv/somebody").is_none());
	}

	#[test]
	fn entry_lookup() {
		assert_eq!(service_entry("prime"), Some("https://www.primevideo.com"));
		assert_eq!(service_entry("nope"), None);
	}
}
