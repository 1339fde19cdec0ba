use serde::{Deserialize, Serialize};

/// Semantic tag constraining which node kinds may occupy a child set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeCategory {
    PythonStatement,
    PythonStatementContents,
    PythonExpression,
    PythonExpressionToken,
    PythonFunctionArgument,
    PythonFunctionArgumentValue,
    PythonAssignable,
    PythonLoopVariable,
    PythonFunctionName,
    PythonFunctionArgumentDeclaration,
    PythonElseBlock,
}

impl NodeCategory {
    pub const ALL: [NodeCategory; 11] = [
        NodeCategory::PythonStatement,
        NodeCategory::PythonStatementContents,
        NodeCategory::PythonExpression,
        NodeCategory::PythonExpressionToken,
        NodeCategory::PythonFunctionArgument,
        NodeCategory::PythonFunctionArgumentValue,
        NodeCategory::PythonAssignable,
        NodeCategory::PythonLoopVariable,
        NodeCategory::PythonFunctionName,
        NodeCategory::PythonFunctionArgumentDeclaration,
        NodeCategory::PythonElseBlock,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_serializes_as_tag() {
        let json = serde_json::to_string(&NodeCategory::PythonExpressionToken).unwrap();
        assert_eq!(json, "\"PythonExpressionToken\"");
        let back: NodeCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeCategory::PythonExpressionToken);
    }
}
