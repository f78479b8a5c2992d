//! Definition documents for the built-in commands.
//!
//! Each document uses the same format as user command files, so a user file
//! with the same `name` replaces the built-in wholesale.

/// Explain what a piece of code does.
pub const EXPLAIN_COMMAND: &str = r#"---
name: explain
description: Explain code functionality with detailed analysis
category: analysis
agent: false
activation_hints: ["explain", "what does", "how does", "walk me through"]
permissions:
  read_files: true
args:
  - name: target
    type: file
    required: true
    description: File or symbol to explain
  - name: depth
    description: How much detail to give
    default: normal
---

# Template

Please provide a {{depth}} explanation of {{target}}.

Please explain:
1. What the code does
2. How it works (key logic and algorithms)
3. Any patterns or best practices used
4. Potential issues or improvements
"#;

/// Comprehensive code review.
pub const REVIEW_COMMAND: &str = r#"---
name: review
description: Perform comprehensive code review
category: analysis
agent: true
agent_id: code-reviewer
activation_hints: ["review", "code review", "look over", "feedback on"]
aliases: [cr]
permissions:
  read_files: true
path_rules:
  - pattern: "**/.env"
    effect: deny
  - pattern: "**/secrets/**"
    effect: deny
args:
  - name: files
    required: true
    description: Files or directories to review
  - name: focus
    description: Aspect to concentrate on
---

# Template

Please perform a comprehensive code review of {{files}}.
{{#if focus}}
Concentrate on {{focus}}, then note anything else that stands out.
{{else}}
Review checklist:
1. Code quality: readability, naming, organization
2. Best practices: error handling, resource management
3. Potential issues: bugs, performance, security
4. Testing: coverage, edge cases
{{/if}}
"#;

/// Security-focused audit.
pub const SECURITY_AUDIT_COMMAND: &str = r#"---
name: security-audit
description: Audit code for security vulnerabilities
category: security
agent: true
agent_id: security-auditor
activation_hints: ["security", "vulnerability", "vulnerabilities", "audit", "cve", "injection"]
aliases: [audit]
permissions:
  read_files: true
path_rules:
  - pattern: "**/secrets/**"
    effect: deny
  - pattern: "**/*.pem"
    effect: deny
  - pattern: "**/*.key"
    effect: deny
args:
  - name: scope
    description: Directory or files to audit
    default: "."
  - name: severity
    description: Lowest severity worth reporting
    default: low
---

# Template

Audit {{scope}} for security vulnerabilities. Report findings of severity {{severity}} and above.

For each finding give the location, the class of vulnerability, how it could be exploited and a concrete fix. Check in particular:
1. Input validation and injection
2. Authentication and authorization
3. Secrets handling
4. Unsafe deserialization and path traversal
"#;

/// Behaviour-preserving restructuring.
pub const REFACTOR_COMMAND: &str = r#"---
name: refactor
description: Restructure code without changing its behaviour
category: code
agent: true
agent_id: refactorer
activation_hints: ["refactor", "clean up", "restructure", "simplify"]
aliases: [rf]
permissions:
  read_files: true
  write_files: true
path_rules:
  - pattern: "**/secrets/**"
    effect: deny
  - pattern: "**/*.lock"
    effect: deny
  - pattern: "src/**"
    effect: allow
  - pattern: "tests/**"
    effect: allow
args:
  - name: target
    type: file
    required: true
    description: File or module to refactor
  - name: goal
    description: What the refactoring should achieve
---

# Template

Refactor: {{target}}{{#if goal}} goal={{goal}}{{/if}}

Keep the public behaviour identical and keep every existing test passing.
"#;

/// Every built-in document, in registration order.
pub const BUILTIN_COMMANDS: &[&str] = &[
    EXPLAIN_COMMAND,
    REVIEW_COMMAND,
    SECURITY_AUDIT_COMMAND,
    REFACTOR_COMMAND,
];
