use stockweather_common::EntityMapping;

/// Seed table of well-known entities. Hand-maintained; the resolver
/// degrades to a single-keyword search for anything not listed here, so
/// an incomplete table costs recall, not availability.
fn seed_mappings() -> Vec<EntityMapping> {
    let entries: &[(&str, &str, &[&str])] = &[
        (
            "Samsung Electronics",
            "00126380",
            &["삼성전자", "samsung", "삼전", "갤럭시", "galaxy", "반도체", "HBM"],
        ),
        (
            "SK Hynix",
            "00164779",
            &["SK하이닉스", "하이닉스", "hynix", "sk hynix", "메모리", "D램"],
        ),
        (
            "LG Electronics",
            "00401731",
            &["LG전자", "엘지전자", "lg electronics", "그램", "가전"],
        ),
        (
            "Hyundai Motor",
            "00164742",
            &["현대차", "현대자동차", "hyundai", "아이오닉", "제네시스", "genesis"],
        ),
        (
            "Kia",
            "00106641",
            &["기아", "기아차", "kia", "EV6", "스포티지"],
        ),
        (
            "Naver",
            "00266961",
            &["네이버", "naver", "라인", "웹툰", "스마트스토어"],
        ),
        (
            "Kakao",
            "00258801",
            &["카카오", "kakao", "카카오톡", "카카오뱅크", "멜론"],
        ),
        (
            "POSCO Holdings",
            "00155319",
            &["포스코", "posco", "포스코홀딩스", "철강", "이차전지소재"],
        ),
        (
            "Celltrion",
            "00421045",
            &["셀트리온", "celltrion", "바이오시밀러", "램시마"],
        ),
        (
            "Korean Air",
            "00113526",
            &["대한항공", "korean air", "항공", "마일리지"],
        ),
    ];

    entries
        .iter()
        .map(|(name, code, terms)| EntityMapping {
            canonical_name: name.to_string(),
            corp_code: Some(code.to_string()),
            search_terms: terms.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}

/// Maps a free-text query to a canonical entity and its expanded search
/// terms. Pure lookup over a table loaded once at construction; shared
/// read-only across requests.
pub struct EntityResolver {
    mappings: Vec<EntityMapping>,
}

impl EntityResolver {
    pub fn new() -> Self {
        Self {
            mappings: seed_mappings(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_mappings(mappings: Vec<EntityMapping>) -> Self {
        Self { mappings }
    }

    /// Resolve a query. Matching order, first match wins: exact canonical
    /// name, exact search term, substring containment in either direction.
    /// No match returns a synthetic single-term mapping so the pipeline
    /// degrades to a plain keyword search instead of failing.
    pub fn resolve(&self, query: &str) -> EntityMapping {
        let normalized = normalize(query);

        for mapping in &self.mappings {
            if normalize(&mapping.canonical_name) == normalized {
                return mapping.clone();
            }
        }

        for mapping in &self.mappings {
            if mapping.search_terms.iter().any(|t| normalize(t) == normalized) {
                return mapping.clone();
            }
        }

        for mapping in &self.mappings {
            let name = normalize(&mapping.canonical_name);
            if name.contains(&normalized) || normalized.contains(&name) {
                return mapping.clone();
            }
            for term in &mapping.search_terms {
                let term = normalize(term);
                if term.contains(&normalized) || normalized.contains(&term) {
                    return mapping.clone();
                }
            }
        }

        let fallback = query.trim().to_string();
        EntityMapping {
            canonical_name: fallback.clone(),
            corp_code: None,
            search_terms: vec![fallback],
        }
    }

    /// Look up a mapping by its disclosure-registry corp code. Used when
    /// the client already picked an entity from a suggestion list.
    pub fn resolve_by_code(&self, code: &str) -> Option<EntityMapping> {
        self.mappings
            .iter()
            .find(|m| m.corp_code.as_deref() == Some(code))
            .cloned()
    }

    /// Corp code for a search term, if the term belongs to a known
    /// mapping. The disclosure provider uses this to address its registry.
    pub fn corp_code_for_term(&self, term: &str) -> Option<String> {
        let resolved = self.resolve(term);
        resolved.corp_code
    }
}

impl Default for EntityResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase and strip internal whitespace, so "Samsung  Electronics"
/// and "samsungelectronics" compare equal.
fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect()
}
