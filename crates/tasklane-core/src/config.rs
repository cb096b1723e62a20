use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};
use url::Url;

use crate::datetime::Zone;
use crate::view::{
  Filter,
  SortKey
};

pub const DEFAULT_API_URL: &str =
  "http://localhost:8000/api/";
const RC_ENV_VAR: &str = "TASKLANE_RC";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "api.url".to_string(),
      DEFAULT_API_URL.to_string()
    );
    map.insert(
      "data.location".to_string(),
      "~/.tasklane".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "view.filter".to_string(),
      "incomplete".to_string()
    );
    map.insert(
      "view.sort".to_string(),
      "priority".to_string()
    );
    map.insert(
      "timezone".to_string(),
      String::new()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      debug!("no rc file found; using defaults");
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// Backend base URL, normalized to end in `/` so relative joins keep
  /// the `/api/` prefix.
  pub fn api_url(
    &self
  ) -> anyhow::Result<Url> {
    let raw = self
      .get("api.url")
      .unwrap_or_else(|| {
        DEFAULT_API_URL.to_string()
      });
    let mut text =
      raw.trim().to_string();
    if !text.ends_with('/') {
      text.push('/');
    }
    Url::parse(&text).with_context(|| {
      format!("invalid api.url: {raw}")
    })
  }

  pub fn view_filter(
    &self
  ) -> anyhow::Result<Filter> {
    match self.get("view.filter") {
      | Some(raw) => {
        raw.parse::<Filter>().context(
          "invalid view.filter"
        )
      }
      | None => Ok(Filter::default())
    }
  }

  pub fn view_sort(
    &self
  ) -> anyhow::Result<SortKey> {
    match self.get("view.sort") {
      | Some(raw) => {
        raw
          .parse::<SortKey>()
          .context("invalid view.sort")
      }
      | None => Ok(SortKey::default())
    }
  }

  pub fn zone(&self) -> Zone {
    Zone::from_config(
      self.map.get("timezone").map(String::as_str)
    )
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let canonical = fs::canonicalize(&path)
      .unwrap_or_else(|_| path.clone());
    if self.loaded_files.iter().any(|seen| {
      fs::canonicalize(seen)
        .unwrap_or_else(|_| seen.clone())
        == canonical
    }) {
      warn!(file = %path.display(), "rc file already loaded; skipping include cycle");
      return Ok(());
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".tasklanerc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".tasklane"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn loads_rc_file_with_include_and_comments()
  {
    let dir = tempdir().expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "view.sort = due_date\n"
    )
    .expect("write include");

    let rc = dir.path().join("main.rc");
    fs::write(
      &rc,
      "# backend\n\
       api.url = https://todo.example.com/api # prod\n\
       include extra.rc\n\
       color = off\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.api_url().expect("url").as_str(),
      "https://todo.example.com/api/"
    );
    assert_eq!(
      cfg.view_sort().expect("sort"),
      SortKey::DueDate
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(false)
    );
    assert_eq!(
      cfg.view_filter().expect("filter"),
      Filter::Incomplete
    );
  }

  #[test]
  fn include_cycles_are_loaded_once() {
    let dir = tempdir().expect("tempdir");
    let rc = dir.path().join("self.rc");
    let other = dir.path().join("other.rc");
    fs::write(
      &rc,
      "include self.rc\n\
       include other.rc\n\
       color = off\n"
    )
    .expect("write rc");
    fs::write(
      &other,
      "include self.rc\n\
       view.sort = due_date\n"
    )
    .expect("write other");

    let cfg = Config::load(Some(&rc))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
    assert_eq!(
      cfg.view_sort().expect("sort"),
      SortKey::DueDate
    );
  }

  #[test]
  fn rejects_line_without_equals() {
    let dir = tempdir().expect("tempdir");
    let rc = dir.path().join("bad.rc");
    fs::write(&rc, "api.url\n")
      .expect("write rc");
    let err = Config::load(Some(&rc))
      .expect_err("invalid line");
    assert!(
      err
        .to_string()
        .contains("invalid config line")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "rc.view.filter".to_string(),
      "complete".to_string()
    )]);
    assert_eq!(
      cfg.view_filter().expect("filter"),
      Filter::Complete
    );
  }

  #[test]
  fn invalid_view_setting_is_reported() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "view.sort".to_string(),
      "urgency".to_string()
    )]);
    assert!(cfg.view_sort().is_err());
  }
}
