//! Prompt construction for the three generative stages.
//!
//! Each builder embeds everything the model needs for one call: the schema in
//! prefixed-name form, the expected output shape and, for translation, a
//! handful of worked question/query pairs.

use serde::{Deserialize, Serialize};

use crate::graph::schema::SchemaDescription;

/// A worked `question -> SPARQL` pair shown to the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub sparql: String,
}

impl FewShotExample {
    pub fn new(question: impl Into<String>, sparql: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            sparql: sparql.into(),
        }
    }
}

/// The bundled book-domain examples.
pub fn default_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new(
            "What is the title of the book by J.K. Rowling?",
            "SELECT ?title WHERE { ?book a :Book ; :author ?author ; :title ?title . ?author :name 'J.K. Rowling' . }",
        ),
        FewShotExample::new(
            "Who wrote the book '1984'?",
            "SELECT ?authorName WHERE { ?book a :Book ; :title '1984' ; :author ?author . ?author :name ?authorName . }",
        ),
        FewShotExample::new(
            "What are the genres of books published in 1945?",
            "SELECT DISTINCT ?genre WHERE { ?book a :Book ; :publicationYear '1945'^^xsd:gYear ; :genre ?genre . }",
        ),
        FewShotExample::new(
            "List all authors and their nationalities.",
            "SELECT ?authorName ?nationality WHERE { ?author a :Author ; :name ?authorName ; :nationality ?nationality . }",
        ),
        FewShotExample::new(
            "Which books were written by British authors?",
            "SELECT ?bookTitle WHERE { ?book a :Book ; :title ?bookTitle ; :author ?author . ?author :nationality 'British' . }",
        ),
        FewShotExample::new(
            "Who was born in 1903?",
            "SELECT ?authorName WHERE { ?author a :Author ; :name ?authorName ; :birthYear '1903'^^xsd:gYear . }",
        ),
    ]
}

/// Prompt asking for a single JSON object `{"sparql_query": ..., "scope": ...}`.
pub fn translation_prompt(
    question: &str,
    schema: &SchemaDescription,
    examples: &[FewShotExample],
) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(
        "You are an expert in SPARQL and RDF knowledge graphs.\n\
         Convert the natural language question into a SPARQL query that can be executed \
         against the knowledge graph described below.\n\n",
    );
    prompt.push_str("Prefixes:\n");
    prompt.push_str(&schema.prologue);
    prompt.push_str("\n\nClasses: ");
    prompt.push_str(&schema.class_list());
    prompt.push_str("\nProperties:\n");
    for property in &schema.properties {
        prompt.push_str("- ");
        prompt.push_str(property);
        prompt.push('\n');
    }

    if !examples.is_empty() {
        prompt.push_str("\nExamples:\n");
        for example in examples {
            let object = serde_json::json!({ "sparql_query": example.sparql });
            prompt.push_str(&format!("\nUser: {:?}\nOutput: {object}\n", example.question));
        }
    }

    prompt.push_str(
        "\nRespond with a single JSON object with the key \"sparql_query\" holding the query. \
         Optionally add the key \"scope\" naming, as a prefixed name such as :Dune, the one entity \
         the question is about. If you cannot formulate a suitable query, return an empty string \
         for \"sparql_query\".\n",
    );
    prompt.push_str(&format!("\nUser: {question:?}\nOutput:\n"));
    prompt
}

/// Prompt asking for Turtle facts that would let `query` answer `question`.
pub fn augmentation_prompt(
    question: &str,
    query: &str,
    scope: &str,
    schema: &SchemaDescription,
    turtle_prelude: &str,
) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(
        "You extend an RDF knowledge graph. The query below returned no results because the \
         graph lacks the relevant facts. Write new facts, in Turtle, so that the query would \
         return an answer.\n\n",
    );
    prompt.push_str(&format!("Question: {question:?}\n"));
    prompt.push_str(&format!("Topic: {scope}\n"));
    prompt.push_str("Query:\n");
    prompt.push_str(query.trim());
    prompt.push_str("\n\nThe following prefixes are already declared:\n");
    prompt.push_str(turtle_prelude);
    prompt.push_str("\nUse only these classes: ");
    prompt.push_str(&schema.class_list());
    prompt.push_str("\nUse only these properties (plus rdf:type and rdfs:label):\n");
    for property in &schema.properties {
        prompt.push_str("- ");
        prompt.push_str(property);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nDescribe the topic entity and every entity directly related to it, each with an \
         rdf:type and the properties the query reads. Mint new resources in the : namespace. \
         Do not redefine classes or properties. Output only Turtle triples with no commentary.\n",
    );
    prompt
}

/// Prompt asking for an answer grounded only in `results_json`.
pub fn synthesis_prompt(question: &str, results_json: &str) -> String {
    format!(
        "You are a helpful assistant that summarizes information from a knowledge graph.\n\
         Given the user's question and the structured results of a knowledge graph query, \
         write a concise natural language answer.\n\
         Use ONLY the data in the results. Do not add facts that are not in the results.\n\n\
         Question: {question:?}\n\
         Knowledge graph results: {results_json}\n\n\
         Answer:\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaDescription {
        SchemaDescription {
            prologue: "PREFIX : <http://example.org/ontology/>".into(),
            classes: vec![":Book".into(), ":Author".into()],
            properties: vec![":title".into(), ":author (:Book -> :Author)".into()],
        }
    }

    #[test]
    fn translation_prompt_embeds_schema_examples_and_question() {
        let prompt = translation_prompt("Who wrote 'Dune'?", &schema(), &default_examples());
        assert!(prompt.contains("PREFIX : <http://example.org/ontology/>"));
        assert!(prompt.contains(":Book, :Author"));
        assert!(prompt.contains("- :author (:Book -> :Author)"));
        assert!(prompt.contains("J.K. Rowling"));
        assert!(prompt.contains("\"sparql_query\""));
        assert!(prompt.trim_end().ends_with("Output:"));
        assert!(prompt.contains("Who wrote 'Dune'?"));
    }

    #[test]
    fn examples_are_rendered_as_json_objects() {
        let examples = vec![FewShotExample::new("q", "SELECT ?x WHERE { ?x :title \"T\" }")];
        let prompt = translation_prompt("x", &schema(), &examples);
        assert!(prompt.contains(r#"{"sparql_query":"SELECT ?x WHERE { ?x :title \"T\" }"}"#));
    }

    #[test]
    fn augmentation_prompt_names_scope_and_vocabulary() {
        let prompt = augmentation_prompt(
            "Recommend books like Dune",
            "SELECT ?t WHERE { :Dune :hasRecommendedBook ?b . ?b :title ?t }",
            ":Dune",
            &schema(),
            "@prefix : <http://example.org/ontology/> .\n",
        );
        assert!(prompt.contains("Topic: :Dune"));
        assert!(prompt.contains(":hasRecommendedBook"));
        assert!(prompt.contains("@prefix : <http://example.org/ontology/> ."));
        assert!(prompt.contains("Output only Turtle"));
    }

    #[test]
    fn synthesis_prompt_grounds_in_results() {
        let prompt = synthesis_prompt("Who wrote 1984?", r#"[{"authorName":"George Orwell"}]"#);
        assert!(prompt.contains("ONLY the data"));
        assert!(prompt.contains("George Orwell"));
    }

    #[test]
    fn example_deserializes_from_toml() {
        let example: FewShotExample =
            toml::from_str("question = \"q\"\nsparql = \"ASK { ?s ?p ?o }\"").unwrap();
        assert_eq!(example.sparql, "ASK { ?s ?p ?o }");
    }
}
