use regex::Regex;

/// One Allow/Disallow value. `*` matches any run of characters and a
/// trailing `$` anchors the end of the URL.
#[derive(Debug, Clone)]
struct Rule {
    len: usize,
    pattern: Regex,
}

impl Rule {
    fn new(value: &str) -> Option<Self> {
        let (body, anchored) = match value.strip_suffix('$') {
            Some(body) => (body, true),
            None => (value, false),
        };
        let mut source = String::from("^");
        source.push_str(
            &body
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*"),
        );
        if anchored {
            source.push('$');
        }

        match Regex::new(&source) {
            Ok(pattern) => Some(Self {
                len: value.len(),
                pattern,
            }),
            Err(e) => {
                tracing::debug!("Ignoring robots.txt rule {:?}: {}", value, e);
                None
            }
        }
    }
}

/// Allow/Disallow rules that apply to every crawler (`User-agent: *`).
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    allow: Vec<Rule>,
    disallow: Vec<Rule>,
}

impl RobotsRules {
    pub fn parse(text: &str) -> Self {
        let mut rules = RobotsRules::default();
        let mut group_applies = false;
        let mut in_agent_lines = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // consecutive user-agent lines share one group
                    if !in_agent_lines {
                        group_applies = false;
                    }
                    in_agent_lines = true;
                    if value == "*" {
                        group_applies = true;
                    }
                }
                "allow" | "disallow" => {
                    in_agent_lines = false;
                    if !group_applies || value.is_empty() {
                        continue;
                    }
                    let Some(rule) = Rule::new(value) else {
                        continue;
                    };
                    if key == "allow" {
                        rules.allow.push(rule);
                    } else {
                        rules.disallow.push(rule);
                    }
                }
                _ => in_agent_lines = false,
            }
        }

        rules
    }

    /// `target` is the URL path plus `?query` when there is one. The
    /// longest matching rule wins; on a tie, Allow wins.
    pub fn is_allowed(&self, target: &str) -> bool {
        let longest = |rules: &[Rule]| {
            rules
                .iter()
                .filter(|r| r.pattern.is_match(target))
                .map(|r| r.len)
                .max()
        };

        match (longest(&self.allow), longest(&self.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }
}
