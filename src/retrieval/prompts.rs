// Prompt templates sent to the language model

/// Few-shot prompt asking for a generic, endpoint-oriented phrasing of `query`
pub(crate) fn rewrite_prompt(query: &str) -> String {
    format!(
        "You are an expert in query understanding and rewriting for vector databases \
containing API documentation.

Rewrite the following query so that a vector database can more effectively \
retrieve relevant documents.

Guidelines:
* If the original query is too conversational or specific, rewrite it as a \
more generic query that the vector database can better understand.
* For example, if the original query is \"find doctors in NY\", a more generic \
rewrite would be \"give API endpoint that finds people based on filters like \
their job and location.\"
* Likewise \"get the LinkedIn profile of John Doe\" becomes \"API endpoint to \
enrich a person profile from a LinkedIn URL.\"
* Output should be short, accurate and capture semantics. Reply with the \
rewritten query only.

Query to rewrite: {query}
Output:"
    )
}

/// Final answering prompt; `context` may be empty
pub(crate) fn answer_prompt(query: &str, rewritten: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no matching documentation found)"
    } else {
        context
    };

    format!(
        "You are a helpful assistant that answers questions about an API using its \
documentation.

Documentation context:
{context}

User question: {query}
Search phrasing of the question: {rewritten}

When answering:
* Always state the endpoint and the HTTP method.
* List the required parameters and the optional parameters separately.
* If the question is about searching or filtering people or companies, \
include an example request.
* If the context does not cover the question, say so instead of guessing."
    )
}
