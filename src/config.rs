use std::time::Duration;

use crate::upstream::model::AudioCodec;

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

#[derive(clap::Parser, Clone, Debug)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum)]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "4664")]
    pub port: u16,

    // this should be either * for allowing everything, or a comma seperated list of domains like
    // example.com,something.com
    #[clap(long, env, default_value = "*")]
    pub cors_origin: String,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,

    // if this is set the client id is never discovered, useful when the discovery breaks after
    // an upstream redesign
    #[clap(long, env)]
    pub client_id: Option<String>,

    // seconds, client ids stay valid for a long time even after the site updates
    #[clap(long, env, default_value = "14400")]
    pub client_id_ttl: u64,

    #[clap(long, env, default_value = "1200")]
    pub user_ttl: u64,

    #[clap(long, env, default_value = "300")]
    pub user_cache_clean_delay: u64,

    #[clap(long, env, default_value = "1200")]
    pub track_ttl: u64,

    #[clap(long, env, default_value = "300")]
    pub track_cache_clean_delay: u64,

    #[clap(long, env, default_value = "1200")]
    pub playlist_ttl: u64,

    #[clap(long, env, default_value = "300")]
    pub playlist_cache_clean_delay: u64,

    // proxy user avatars and artwork through /_/proxy/images
    #[clap(long, env, default_value_t = false)]
    pub proxy_images: bool,

    #[clap(long, env, default_value = "max-age=600, public, immutable")]
    pub image_cache_control: String,

    // proxy hls playlists and their segments through /_/proxy/streams
    #[clap(long, env, default_value_t = false)]
    pub proxy_streams: bool,

    // restream hls as a single file through /_/restream
    #[clap(long, env, default_value_t = false)]
    pub restream: bool,

    #[clap(long, env, default_value = "max-age=3600, public, immutable")]
    pub restream_cache_control: String,

    // codec for the hls player: best, aac, opus or mpeg. Falls back to mp3 when the track
    // doesn't have it
    #[clap(long, env, default_value = "mpeg")]
    pub hls_audio: AudioCodec,

    // same thing for /_/restream, unless the request asks for something else with ?audio=
    #[clap(long, env, default_value = "mpeg")]
    pub restream_audio: AudioCodec,

    // codec for /_/restream?metadata=true downloads
    #[clap(long, env, default_value = "mpeg")]
    pub download_audio: AudioCodec,

    // fetch the links users put on their profile, one more request for every user we resolve
    #[clap(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub get_web_profiles: bool,

    #[clap(long, env, default_value = "insomnia/2023.2.0")]
    pub user_agent: String,

    // seconds, the upstream closes idle connections on its own so this can be long
    #[clap(long, env, default_value = "14400")]
    pub max_idle_conn_duration: u64,
}

impl AppConfig {
    pub fn client_id_ttl(&self) -> Duration {
        Duration::from_secs(self.client_id_ttl)
    }

    pub fn max_idle_conn_duration(&self) -> Duration {
        Duration::from_secs(self.max_idle_conn_duration)
    }
}

impl Default for AppConfig {
    // mostly for tests, the real thing always goes through clap
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 4664,
            cors_origin: "*".to_string(),
            sentry_dsn: None,
            client_id: None,
            client_id_ttl: 4 * 60 * 60,
            user_ttl: 20 * 60,
            user_cache_clean_delay: 5 * 60,
            track_ttl: 20 * 60,
            track_cache_clean_delay: 5 * 60,
            playlist_ttl: 20 * 60,
            playlist_cache_clean_delay: 5 * 60,
            proxy_images: false,
            image_cache_control: "max-age=600, public, immutable".to_string(),
            proxy_streams: false,
            restream: false,
            restream_cache_control: "max-age=3600, public, immutable".to_string(),
            hls_audio: AudioCodec::Mpeg,
            restream_audio: AudioCodec::Mpeg,
            download_audio: AudioCodec::Mpeg,
            get_web_profiles: false,
            user_agent: "insomnia/2023.2.0".to_string(),
            max_idle_conn_duration: 4 * 60 * 60,
        }
    }
}
