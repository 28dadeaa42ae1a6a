use tracing::info;

use crate::api::job::JobPosting;

/// Matches needed from a single language's list before a posting is flagged
const KEYWORD_THRESHOLD: usize = 3;

const DUTCH_KEYWORDS: &[&str] = &[
    "wij bieden", "bruto", "tussen", "voor", "schaal", "volgens cao", "vakantie",
    "uitkering", "vergoeding", "zorgverzekering", "secundaire", "arbeidsvoorwaarden",
    "pensioensregeling", "welzijn", "onboardingstraject", "ontwikkelen", "plezier",
    "trots", "diploma", "kinderopvang", "bevoegd", "bijvoorbeeld",
];

const PORTUGUESE_KEYWORDS: &[&str] = &[
    "atividades", "para início imediato", "assessorando", "produção", "liderar",
    "equipe", "suporte", "garantir", "manutenção", "visando", "corretiva", "preventiva",
    "funcionamento", "equipamentos", "administrar", "recursos", "condições", "instalações",
    "realizar", "quando necessário", "cumprir", "planos", "requisitos", "experiência",
    "segmento", "residir", "disponibilidade", "benefícios",
];

const SPANISH_KEYWORDS: &[&str] = &[
    "experiencia", "líder", "requisitos", "responsabilidades", "habilidades",
    "conocimientos", "buscamos", "ofrece", "jornada", "contrato", "salario",
    "formación", "perfil", "empresa", "puesto", "ubicación", "vacante",
];

const LANGUAGES: &[&[&str]] = &[DUTCH_KEYWORDS, PORTUGUESE_KEYWORDS, SPANISH_KEYWORDS];

/// Count how many keywords of one list occur anywhere in `text`.
///
/// Plain substring search: "voor" also hits "voorbeeld". Keep it that way,
/// the thresholds were tuned against this behavior.
fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|keyword| text.contains(*keyword)).count()
}

/// Heuristic check for postings written in Dutch, Portuguese or Spanish.
///
/// A posting without a description is never flagged since there is nothing
/// to judge it by.
pub fn is_non_english(job: &JobPosting) -> bool {
    if job.description.trim().is_empty() {
        return false;
    }

    let text = format!("{} {} {}", job.title, job.description, job.company).to_lowercase();

    if LANGUAGES
        .iter()
        .any(|keywords| keyword_hits(&text, keywords) >= KEYWORD_THRESHOLD)
    {
        return true;
    }

    let title = &job.title;
    (title.contains("BSO") && title.contains("Pedagogisch"))
        || title.contains("LÍDER")
        || title.contains("LIDER")
}

/// Drop non-English postings, keeping the order of the rest.
///
/// Returns the surviving postings and how many were removed.
pub fn filter_non_english(jobs: Vec<JobPosting>) -> (Vec<JobPosting>, usize) {
    let original = jobs.len();
    let kept: Vec<JobPosting> = jobs.into_iter().filter(|job| !is_non_english(job)).collect();
    let removed = original - kept.len();

    if removed > 0 {
        info!("Filtered out {} non-English job listings", removed);
    }

    (kept, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(title: &str, description: &str) -> JobPosting {
        JobPosting {
            id: title.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            company: "Acme".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_description_is_never_flagged() {
        // Title alone would trip the marker check
        assert!(!is_non_english(&posting("LÍDER de Equipe", "")));
        assert!(!is_non_english(&posting("LÍDER de Equipe", "   \n\t")));
    }

    #[test]
    fn three_portuguese_keywords_flag_the_posting() {
        let job = posting(
            "Desenvolvedor Go",
            "Buscamos alguém para garantir o suporte da equipe.",
        );
        assert!(is_non_english(&job));
    }

    #[test]
    fn two_keywords_are_not_enough() {
        let job = posting("Desenvolvedor Go", "Trabalhe com nossa equipe de suporte.");
        assert!(!is_non_english(&job));
    }

    #[test]
    fn dutch_and_spanish_lists_are_counted_separately() {
        let dutch = posting(
            "Go ontwikkelaar",
            "Wij bieden een bruto salaris en vakantie geld.",
        );
        assert!(is_non_english(&dutch));

        let spanish = posting(
            "Desarrollador Go",
            "Buscamos perfil con experiencia; contrato indefinido.",
        );
        assert!(is_non_english(&spanish));
    }

    #[test]
    fn matching_is_case_insensitive_and_includes_company() {
        let mut job = posting("Go Developer", "REQUISITOS: Experiencia con Go.");
        assert!(!is_non_english(&job));
        job.company = "Empresa Tech".to_string();
        assert!(is_non_english(&job));
    }

    #[test]
    fn title_markers_flag_the_posting() {
        assert!(is_non_english(&posting("LIDER TECNICO", "Go services")));
        assert!(is_non_english(&posting(
            "Pedagogisch medewerker BSO",
            "Go services"
        )));
        // One marker of the pair is not enough
        assert!(!is_non_english(&posting("BSO engineer", "Go services")));
    }

    #[test]
    fn english_posting_passes() {
        let job = posting(
            "Senior Golang Engineer",
            "Build and operate Go microservices. Strong experience with Kubernetes.",
        );
        assert!(!is_non_english(&job));
    }

    #[test]
    fn filter_preserves_order_and_reports_removed() {
        let jobs = vec![
            posting("Go Engineer A", "Write Go."),
            posting("LIDER", "Go"),
            posting("Go Engineer B", "Write more Go."),
        ];

        let (kept, removed) = filter_non_english(jobs);
        assert_eq!(removed, 1);
        let titles: Vec<_> = kept.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Go Engineer A", "Go Engineer B"]);
    }
}
