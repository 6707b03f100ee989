//! Sigsum policy text format.
//!
//! ```text
//! log <hex-pubkey> [url]
//! witness <name> <hex-pubkey> [url]
//! group <name> <any|all|k> <member>...
//! quorum <name>
//! ```
//!
//! `#` starts a comment. Witness and group names share one namespace, and the
//! reserved name `none` is bound to the always-satisfied empty quorum.

use super::model::{Entity, Policy, PolicyBuilder, PolicyError, Quorum};
use crate::encoding::{decode_hex, EncodingError};
use crate::types::RawPublicKey;
use std::collections::HashMap;

/// Reserved name of the empty quorum.
pub const NONE_QUORUM_NAME: &str = "none";

/// Parse policy text into a sealed [`Policy`].
pub fn parse_policy_text(text: &str) -> Result<Policy, PolicyError> {
    let mut parser = PolicyParser::new();
    for line in text.lines() {
        parser.parse_line(line)?;
    }
    parser.finish()
}

/// Single-use parse state: the policy under construction and the name environment.
struct PolicyParser {
    builder: PolicyBuilder,
    names: HashMap<String, Quorum>,
}

impl PolicyParser {
    fn new() -> Self {
        let mut names = HashMap::new();
        names.insert(NONE_QUORUM_NAME.to_string(), Quorum::none());
        Self {
            builder: PolicyBuilder::new(),
            names,
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<(), PolicyError> {
        let line = match line.find('#') {
            Some(i) => &line[..i],
            None => line,
        };
        let mut fields = line.split_whitespace();
        let Some(keyword) = fields.next() else {
            return Ok(());
        };
        let args: Vec<&str> = fields.collect();

        match keyword {
            "log" => self.parse_log(&args),
            "witness" => self.parse_witness(&args),
            "group" => self.parse_group(&args),
            "quorum" => self.parse_quorum(&args),
            other => Err(PolicyError::UnknownKeyword(other.to_string())),
        }
    }

    fn parse_log(&mut self, args: &[&str]) -> Result<(), PolicyError> {
        let (key, url) = match args {
            [key] => (key, None),
            [key, url] => (key, Some(url.to_string())),
            _ => return Err(PolicyError::LogSyntax),
        };
        self.builder.add_log(Entity::new(parse_key(key)?, url))?;
        Ok(())
    }

    fn parse_witness(&mut self, args: &[&str]) -> Result<(), PolicyError> {
        let (name, key, url) = match args {
            [name, key] => (name, key, None),
            [name, key, url] => (name, key, Some(url.to_string())),
            _ => return Err(PolicyError::WitnessSyntax),
        };
        self.check_unused(name)?;
        let hash = self
            .builder
            .add_witness(Entity::new(parse_key(key)?, url))?;
        self.names.insert(name.to_string(), Quorum::single(hash));
        Ok(())
    }

    fn parse_group(&mut self, args: &[&str]) -> Result<(), PolicyError> {
        let [name, threshold, members @ ..] = args else {
            return Err(PolicyError::GroupSyntax);
        };
        if members.is_empty() {
            return Err(PolicyError::GroupSyntax);
        }
        self.check_unused(name)?;

        let k = match *threshold {
            "any" => 1,
            "all" => members.len(),
            raw => raw.parse::<usize>().map_err(|_| PolicyError::InvalidThreshold {
                k: 0,
                members: members.len(),
            })?,
        };

        let subs = members
            .iter()
            .map(|m| self.lookup(m).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let group = Quorum::k_of_n(subs, k)?;
        self.names.insert(name.to_string(), group);
        Ok(())
    }

    fn parse_quorum(&mut self, args: &[&str]) -> Result<(), PolicyError> {
        let [name] = args else {
            return Err(PolicyError::QuorumSyntax);
        };
        let quorum = self.lookup(name)?.clone();
        if quorum.is_none() {
            tracing::warn!("policy quorum is `none`: cosignatures will not be required");
        }
        self.builder.set_quorum(quorum)
    }

    fn lookup(&self, name: &str) -> Result<&Quorum, PolicyError> {
        self.names
            .get(name)
            .ok_or_else(|| PolicyError::UndefinedName(name.to_string()))
    }

    fn check_unused(&self, name: &str) -> Result<(), PolicyError> {
        if self.names.contains_key(name) {
            return Err(PolicyError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn finish(self) -> Result<Policy, PolicyError> {
        self.builder.build()
    }
}

fn parse_key(hex: &str) -> Result<RawPublicKey, PolicyError> {
    let bytes = decode_hex(hex)?;
    RawPublicKey::from_slice(&bytes).map_err(|e| match e {
        EncodingError::InvalidLength { .. } => PolicyError::InvalidKeyLength,
        other => PolicyError::InvalidKeyEncoding(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyHash;
    use std::collections::HashSet;

    const LOG1: &str = "4644af2abd40f4895a003bca350f9d5912ab301a49c77f13e5b6d905c20a5fe6";
    const LOG2: &str = "0ec7e16843119b120377a73913ac6acbc2d03d82432e2c36b841b09a95841f25";
    const NISSE: &str = "1c25f8a44c635457e2e391d1efbca7d4c2951a0aef06225a881e46b98962ac6c";
    const RGDD: &str = "28c92a5a3a054d317c86fc2eeb6a7ab2054d6217100d0be67ded5b74323c5806";
    const SMARTIT: &str = "f4855a0f46e8a3e23bb40faf260ee57ab8a18249fa402f2ca2d28a60e1a3130e";
    const GLASKLAR: &str = "b2106db9065ec97f25e09c18839216751a6e26d8ed8b41e485a563d3d1498536";
    const MULLVAD: &str = "15d6d0141543247b74bab3c1076372d9c894f619c376d64b29aa312cc00f61ad";

    fn hash_of(hex: &str) -> KeyHash {
        KeyHash::of(&RawPublicKey::from_hex(hex).unwrap())
    }

    #[test]
    fn test_parse_flat_policy() {
        let text = format!(
            "
            log {LOG1} https://test.sigsum.org/barreleye
            log {LOG2} https://seasalp.glasklar.is

            witness test-nisse    {NISSE}
            witness test-rgdd     {RGDD}
            witness test-smartit  {SMARTIT}
            witness prod-glasklar {GLASKLAR}
            witness prod-mullvad  {MULLVAD}

            group test-majority 2 test-nisse test-rgdd test-smartit
            group prod-strict all prod-glasklar prod-mullvad
            group mixed 3 test-nisse test-rgdd test-smartit prod-glasklar prod-mullvad

            quorum mixed"
        );
        let policy = parse_policy_text(&text).unwrap();

        assert_eq!(policy.logs().len(), 2);
        assert_eq!(policy.witnesses().len(), 5);
        let log = policy.log(&hash_of(LOG1)).unwrap();
        assert_eq!(log.url.as_deref(), Some("https://test.sigsum.org/barreleye"));

        match policy.quorum() {
            Quorum::KofN { members, k } => {
                assert_eq!(*k, 3);
                assert_eq!(members.len(), 5);
            }
            Quorum::Single(_) => panic!("expected a group"),
        }
    }

    #[test]
    fn test_parse_any_all_nested() {
        let text = format!(
            "
            log {LOG1}
            witness nisse    {NISSE}
            witness rgdd     {RGDD}
            witness smartit  {SMARTIT}
            witness glasklar {GLASKLAR}
            witness mullvad  {MULLVAD}

            group test-any any nisse rgdd smartit
            group prod-all all glasklar mullvad
            group test-2of3 2 nisse rgdd smartit
            group combined any test-2of3 prod-all

            # Final quorum
            quorum combined # trailing comment"
        );
        let policy = parse_policy_text(&text).unwrap();

        let Quorum::KofN { members, k } = policy.quorum() else {
            panic!("expected a group");
        };
        assert_eq!(*k, 1);
        let mut sub_ks: Vec<usize> = members
            .iter()
            .map(|m| match m {
                Quorum::KofN { k, .. } => *k,
                Quorum::Single(_) => 0,
            })
            .collect();
        sub_ks.sort();
        assert_eq!(sub_ks, vec![2, 2]);

        let mut present: HashSet<KeyHash> = [hash_of(GLASKLAR)].into_iter().collect();
        assert!(!policy.is_quorum(&present));
        present.insert(hash_of(MULLVAD));
        assert!(policy.is_quorum(&present));
    }

    #[test]
    fn test_quorum_none() {
        let text = format!("log {LOG1}\nwitness nisse {NISSE}\nquorum none\n");
        let policy = parse_policy_text(&text).unwrap();
        assert!(policy.quorum().is_none());
        assert!(policy.is_quorum(&HashSet::new()));
    }

    #[test]
    fn test_unknown_keyword() {
        let text = format!("log {LOG1}\ninvalid_keyword something\nquorum none\n");
        assert_eq!(
            parse_policy_text(&text).unwrap_err().to_string(),
            "Unknown keyword: invalid_keyword"
        );
    }

    #[test]
    fn test_undefined_name() {
        let text = format!("log {LOG1}\nwitness nisse {NISSE}\ngroup outer 1 nested\nquorum outer\n");
        assert_eq!(
            parse_policy_text(&text).unwrap_err(),
            PolicyError::UndefinedName("nested".to_string())
        );
    }

    #[test]
    fn test_impossible_threshold() {
        let text = format!(
            "witness n1 {NISSE}\nwitness n2 {RGDD}\nwitness n3 {SMARTIT}\nwitness n4 {GLASKLAR}\n\
             group impossible 5 n1 n2 n3 n4\nquorum impossible\n"
        );
        let err = parse_policy_text(&text).unwrap_err();
        assert!(err.to_string().starts_with("invalid threshold"));
    }

    #[test]
    fn test_non_numeric_threshold() {
        let text = format!("witness n1 {NISSE}\ngroup g most n1\nquorum g\n");
        assert!(matches!(
            parse_policy_text(&text),
            Err(PolicyError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_syntax_errors() {
        let cases = [
            (format!("witness {NISSE}\nquorum none\n"), PolicyError::WitnessSyntax),
            (format!("log {LOG1} https://url extra\n"), PolicyError::LogSyntax),
            (format!("witness n {NISSE}\ngroup broken 1\n"), PolicyError::GroupSyntax),
            ("quorum\n".to_string(), PolicyError::QuorumSyntax),
            ("quorum a b\n".to_string(), PolicyError::QuorumSyntax),
        ];
        for (text, expected) in cases {
            assert_eq!(parse_policy_text(&text).unwrap_err(), expected, "{text}");
        }
    }

    #[test]
    fn test_invalid_key() {
        let text = format!("log {LOG1}\nwitness nisse 123abc\nquorum none\n");
        assert_eq!(
            parse_policy_text(&text).unwrap_err().to_string(),
            "Ed25519 raw keys must be exactly 32-bytes"
        );

        let text = format!("log {LOG1}\nwitness nisse zz{}\nquorum none\n", &NISSE[2..]);
        assert!(matches!(
            parse_policy_text(&text),
            Err(PolicyError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn test_duplicates() {
        let text = format!("log {LOG2}\nlog {LOG2}\nquorum none\n");
        assert!(matches!(
            parse_policy_text(&text),
            Err(PolicyError::DuplicateLog(_))
        ));

        let text = format!("witness nisse {NISSE}\nwitness dup {NISSE}\nquorum nisse\n");
        assert!(matches!(
            parse_policy_text(&text),
            Err(PolicyError::DuplicateWitness(_))
        ));

        let text = format!("witness nisse {NISSE}\nwitness nisse {RGDD}\nquorum nisse\n");
        assert_eq!(
            parse_policy_text(&text).unwrap_err().to_string(),
            "duplicate name: nisse"
        );

        let text = format!("witness nisse {NISSE}\ngroup none any nisse\nquorum none\n");
        assert_eq!(
            parse_policy_text(&text).unwrap_err(),
            PolicyError::DuplicateName("none".to_string())
        );
    }

    #[test]
    fn test_quorum_set_twice() {
        let text = format!("witness nisse {NISSE}\nquorum nisse\nquorum nisse\n");
        assert_eq!(
            parse_policy_text(&text).unwrap_err(),
            PolicyError::QuorumAlreadySet
        );
    }

    #[test]
    fn test_missing_quorum() {
        let text = format!("log {LOG1}\nwitness nisse {NISSE}\n");
        assert_eq!(parse_policy_text(&text).unwrap_err(), PolicyError::NoQuorum);
    }
}
